use chrono::{Datelike, Local, NaiveDate};
use std::cmp::Ordering;
use std::fmt;

/// JDN of 1 Muharram AH 1 on the civil (Friday) epoch.
const ISLAMIC_EPOCH_JDN: i64 = 1_948_440;
/// `NaiveDate::num_days_from_ce()` of 0001-01-01 is 1; its JDN is 1721426.
const CE_TO_JDN_OFFSET: i64 = 1_721_425;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HijriDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl fmt::Display for HijriDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

/// Parses `YYYY/MM/DD`. Padding is optional; extra components are ignored.
pub fn parse_hijri(raw: &str) -> Option<HijriDate> {
    let parts: Vec<&str> = raw.trim().split('/').map(|p| p.trim()).collect();
    if parts.len() < 3 {
        return None;
    }
    Some(HijriDate {
        year: parts[0].parse().ok()?,
        month: parts[1].parse().ok()?,
        day: parts[2].parse().ok()?,
    })
}

/// Orders by (year, month, day). Unparseable dates sort before every valid one.
pub fn compare_hijri(a: &str, b: &str) -> Ordering {
    match (parse_hijri(a), parse_hijri(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Zero-pads a parseable date; anything else comes back trimmed.
pub fn normalize_hijri(raw: &str) -> String {
    parse_hijri(raw)
        .map(|d| d.to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

fn islamic_to_jdn(year: i64, month: i64, day: i64) -> i64 {
    day + ((29.5 * (month - 1) as f64).ceil() as i64)
        + (year - 1) * 354
        + (3 + 11 * year).div_euclid(30)
        + ISLAMIC_EPOCH_JDN
        - 1
}

/// Tabular Islamic calendar conversion. Observed calendars such as Umm al-Qura
/// can start a month one day later or earlier than this.
pub fn gregorian_to_hijri(date: NaiveDate) -> HijriDate {
    let jdn = i64::from(date.num_days_from_ce()) + CE_TO_JDN_OFFSET;
    let year = (30 * (jdn - ISLAMIC_EPOCH_JDN) + 10646).div_euclid(10631);
    let first_of_year = islamic_to_jdn(year, 1, 1);
    let month = ((((jdn - (29 + first_of_year)) as f64) / 29.5).ceil() as i64 + 1).clamp(1, 12);
    let day = jdn - islamic_to_jdn(year, month, 1) + 1;
    HijriDate {
        year: year as i32,
        month: month as u32,
        day: day as u32,
    }
}

/// Local date on the tabular calendar. Near a month boundary this may be one
/// day off the official calendar, which can flip a due date by a day; pin
/// `--today` or pass `today` when the exact official date matters.
pub fn hijri_today() -> HijriDate {
    gregorian_to_hijri(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn compare_orders_components() {
        assert_eq!(compare_hijri("1445/01/01", "1445/01/02"), Ordering::Less);
        assert_eq!(compare_hijri("1445/02/01", "1445/01/30"), Ordering::Greater);
        assert_eq!(compare_hijri("1445/03/10", "1445/03/10"), Ordering::Equal);
        assert_eq!(compare_hijri("1444/12/29", "1445/01/01"), Ordering::Less);
    }

    #[test]
    fn compare_is_numeric_not_lexical() {
        assert_eq!(compare_hijri("1445/9/1", "1445/10/1"), Ordering::Less);
        assert_eq!(compare_hijri("1445/03/5", "1445/3/05"), Ordering::Equal);
    }

    #[test]
    fn malformed_dates_are_earliest() {
        assert_eq!(compare_hijri("1445/01", "0001/01/01"), Ordering::Less);
        assert_eq!(compare_hijri("", "1445/01/01"), Ordering::Less);
        assert_eq!(compare_hijri("1445/01/01", "soon"), Ordering::Greater);
        assert_eq!(compare_hijri("a/b/c", "x"), Ordering::Equal);
    }

    #[test]
    fn normalize_pads_components() {
        assert_eq!(normalize_hijri(" 1445/3/7 "), "1445/03/07");
        assert_eq!(normalize_hijri("next week"), "next week");
    }

    #[test]
    fn converts_known_new_year_dates() {
        assert_eq!(gregorian_to_hijri(ymd(2023, 7, 19)).to_string(), "1445/01/01");
        assert_eq!(gregorian_to_hijri(ymd(2023, 7, 18)).to_string(), "1444/12/29");
    }

    #[test]
    fn stays_within_a_day_of_umm_al_qura_month_starts() {
        let official = [
            (ymd(2023, 3, 23), (1444, 9, 1)),
            (ymd(2023, 7, 19), (1445, 1, 1)),
            (ymd(2024, 3, 11), (1445, 9, 1)),
            (ymd(2024, 4, 10), (1445, 10, 1)),
            (ymd(2024, 7, 7), (1446, 1, 1)),
        ];
        for (date, (y, m, d)) in official {
            let h = gregorian_to_hijri(date);
            let drift = islamic_to_jdn(i64::from(h.year), i64::from(h.month), i64::from(h.day))
                - islamic_to_jdn(y, m, d);
            assert!(drift.abs() <= 1, "{} drifted {} days", date, drift);
        }
        assert_eq!(gregorian_to_hijri(ymd(2024, 7, 7)).to_string(), "1445/12/30");
    }

    #[test]
    fn conversion_is_monotonic_over_a_year() {
        let mut prev = gregorian_to_hijri(ymd(2024, 1, 1));
        let mut d = ymd(2024, 1, 2);
        while d < ymd(2025, 1, 1) {
            let cur = gregorian_to_hijri(d);
            assert!(cur > prev, "{} did not advance past {}", cur, prev);
            assert!((1..=30).contains(&cur.day));
            prev = cur;
            d = d.succ_opt().expect("next day");
        }
    }
}
