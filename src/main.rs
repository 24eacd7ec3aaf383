mod attainment;
mod cli;
mod config;
mod db;
mod error;
mod extract;
mod ipc;
mod layout;
mod sheet;
mod upload;

use clap::Parser;
use std::io::{self, BufRead, Write};

fn main() {
    // stdout carries responses; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = cli::Args::parse();
    let config = match args.load_config() {
        Ok(v) => v,
        Err(e) => {
            log::error!("failed to load configuration: {e:#}");
            std::process::exit(2);
        }
    };
    log::info!(
        "coattaind {} ready (threshold {}, {} CO->PO rows)",
        env!("CARGO_PKG_VERSION"),
        config.threshold,
        config.co_po_mapping.len()
    );

    let mut state = ipc::AppState::new(config);

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
                // Can't reply without id; report and move on.
                log::warn!("dropping malformed request: {e}");
                let _ = writeln!(
                    stdout,
                    "{}",
                    serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    })
                );
                let _ = stdout.flush();
                continue;
            }
        };

        log::debug!("request {} {}", req.id, req.method);
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
