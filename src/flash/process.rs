//! Writer subprocess runner
//!
//! Spawns the writer, forwards every output line to the event stream and
//! hands each line to the adapter's progress parser. `dd` and Rufus redraw
//! their progress with bare carriage returns, so output is split on both
//! `\r` and `\n`.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::{FlashError, Result};
use crate::events::EventBus;
use crate::{log_debug, log_error, log_info};

const MODULE: &str = "flash::process";

/// Map a process exit code to the flash outcome
///
/// `None` means the process was terminated by a signal and is a failure of
/// its own kind.
pub fn exit_code_to_result(code: Option<i32>) -> Result<()> {
    match code {
        Some(0) => Ok(()),
        Some(code) => Err(FlashError::WriteExit { code }),
        None => Err(FlashError::WriteTerminated),
    }
}

/// Split a byte chunk into lines on `\r` or `\n`
///
/// Bytes after the last separator stay in `pending` for the next chunk.
pub fn split_output_lines(pending: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    for &byte in chunk {
        if byte == b'\r' || byte == b'\n' {
            if let Some(line) = take_line(pending) {
                lines.push(line);
            }
        } else {
            pending.push(byte);
        }
    }
    lines
}

fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    if pending.is_empty() {
        return None;
    }
    let line = String::from_utf8_lossy(pending).trim().to_string();
    pending.clear();
    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

async fn pump<R>(mut reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; 4096];
    let mut pending = Vec::new();

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                for line in split_output_lines(&mut pending, &buffer[..n]) {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                log_debug!(MODULE, "Output stream closed with error: {}", e);
                break;
            }
        }
    }

    if let Some(line) = take_line(&mut pending) {
        let _ = tx.send(line);
    }
}

/// Run `program args...` to completion
///
/// Every stdout/stderr line is published as a log event and passed to
/// `on_line`. The exit status decides the result.
pub async fn run_writer<F>(program: &str, args: &[String], events: &EventBus, mut on_line: F) -> Result<()>
where
    F: FnMut(&str),
{
    log_info!(MODULE, "Executing: {} {}", program, args.join(" "));
    events.log_line(format!("Executing: {} {}", program, args.join(" ")));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            log_error!(MODULE, "Failed to start {}: {}", program, e);
            FlashError::WriteSpawn {
                cause: format!("{}: {}", program, e),
            }
        })?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(stderr, tx.clone()));
    }
    drop(tx);

    while let Some(line) = rx.recv().await {
        log_debug!(MODULE, "{}", line);
        events.log_line(line.as_str());
        on_line(&line);
    }

    let status = child.wait().await.map_err(|e| FlashError::WriteSpawn {
        cause: format!("Failed to wait for {}: {}", program, e),
    })?;

    log_info!(MODULE, "{} finished with {}", program, status);
    exit_code_to_result(status.code())
}
