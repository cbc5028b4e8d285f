mod calc;
mod config;
mod curriculum;
mod db;
mod exchange;
mod hijri;
mod ipc;
mod legacy;
mod logging;
mod model;

use clap::Parser;
use log::{error, warn};
use std::io::{self, BufRead, Write};

fn main() {
    let cfg = config::Config::parse();

    let level = cfg
        .log_level
        .clone()
        .unwrap_or_else(|| logging::default_log_level().to_string());
    if let Err(e) = logging::init_logging(&level, cfg.log_dir.as_deref()) {
        eprintln!("gradebookd: logging disabled: {}", e);
    }

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        today: cfg.today,
    };
    if let Some(path) = cfg.workspace.clone() {
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            error!("event=startup module=core status=error error={}", e);
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "event=ipc_request module=ipc status=bad_json error={}",
                    logging::sanitize_message(&e.to_string(), 160)
                );
                // Can't reply without id.
                let reply = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", reply);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
