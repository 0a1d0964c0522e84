//! Minimal line-oriented front end.
//!
//! Reads operator input on a dedicated thread and forwards each line, in
//! order, over the command channel. Reading runs on a plain thread rather
//! than the runtime because a blocking stdin read would otherwise hold up
//! runtime shutdown.

use std::io::BufRead;
use std::thread::JoinHandle;

use tokio::sync::mpsc;

/// Forward lines from `reader` until EOF, an `exit` command, or a closed channel.
///
/// Returns the number of lines forwarded.
pub fn forward_lines<R: BufRead>(reader: R, tx: &mpsc::Sender<String>) -> usize {
    let mut sent = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read command line");
                break;
            }
        };
        let is_exit = line.trim() == "exit";
        if tx.blocking_send(line).is_err() {
            // Manager has gone away
            break;
        }
        sent += 1;
        if is_exit {
            break;
        }
    }
    sent
}

/// Spawn the stdin reader thread.
pub fn spawn_stdin_forwarder(tx: mpsc::Sender<String>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("frontend".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            let sent = forward_lines(stdin.lock(), &tx);
            tracing::debug!(sent, "Front end finished");
        })
}
