mod calc;
mod config;
mod db;
mod ipc;
mod logging;
mod model;

use serde_json::json;
use std::io::{self, BufRead, Write};

fn main() {
    let config = config::Config::from_env();
    logging::init(&config);

    let mut state = ipc::AppState::default();
    if let Some(path) = config.workspace.as_deref() {
        // A bad startup workspace is reported and left unselected; the host
        // can still pick one with workspace.select.
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            tracing::error!(
                workspace = %path.display(),
                error = %e,
                "startup workspace open failed"
            );
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gradebookd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
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

    tracing::info!("stdin closed, exiting");
}
