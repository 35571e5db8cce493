//! Serve command handler: long-running stdio tool surface (§6.1).
//!
//! Unlike every other command here, `serve` owns a persistent multi-thread
//! runtime for the duration of the process — `ToolServer` hosts state
//! (realtime-sync watchers, the shared `SyncController`) that must outlive a
//! single request, which the one-shot `run_*_local` commands never need.

use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use semantic_code_facade::ToolServer;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Run the stdio tool surface: read newline-delimited JSON requests from
/// stdin, dispatch them against a shared `ToolServer`, and write one
/// newline-delimited JSON response per request to stdout. Runs until EOF.
pub fn run_serve(config_path: Option<&Path>) -> Result<CliOutput, CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let server = ToolServer::new(config_path.map(Path::to_path_buf));
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = runtime.block_on(server.dispatch_line(&line));
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }

    Ok(CliOutput {
        stdout: String::new(),
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}
