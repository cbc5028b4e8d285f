use clap::Parser;
use std::path::PathBuf;

use crate::hijri::{parse_hijri, HijriDate};

/// Grade engine sidecar: reads JSON requests on stdin, writes responses on stdout.
#[derive(Debug, Clone, Parser)]
#[command(name = "gradebookd", version, about)]
pub struct Config {
    /// Workspace directory to open at startup.
    #[arg(long, env = "GRADEBOOKD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "GRADEBOOKD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rotating log files. Logs go to stderr when unset.
    #[arg(long, env = "GRADEBOOKD_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Pins "today" (Hijri YYYY/MM/DD) for requests that do not pass one.
    #[arg(long, env = "GRADEBOOKD_TODAY", value_parser = parse_today)]
    pub today: Option<HijriDate>,
}

fn parse_today(raw: &str) -> Result<HijriDate, String> {
    parse_hijri(raw).ok_or_else(|| format!("expected YYYY/MM/DD, got `{raw}`"))
}
