use crate::session::Lines;
use std::io::BufRead;
use tokio::sync::mpsc;

/// Reads stdin lines on a dedicated thread.
///
/// tokio's own stdin reader blocks runtime shutdown until the next line is
/// entered, so a plain thread is used and left to die with the process.
pub fn stdin_lines() -> Lines {
    let (tx, rx) = mpsc::channel(32);
    let spawned = std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        tracing::warn!("failed to read stdin: {}", err);
                        break;
                    }
                };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            tracing::debug!("stdin closed");
        });
    if let Err(err) = spawned {
        tracing::error!("failed to spawn stdin reader: {}", err);
    }
    rx
}
