//! Cooperative stream shutdown.
//!
//! Stopping a stream means removing its registry entry, asking the running
//! encoder to quit, and arming a forced-kill timer in case it does not. The
//! supervisor loop observes the removal at its next checkpoint and tears the
//! stream down without retrying.

use crate::registry::StreamRegistry;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Soft-stop byte understood by the encoder's interactive stdin
const SOFT_STOP: &[u8] = b"q";

/// Stop a stream.
///
/// Removes the registry entry first; that removal is the stop signal, so a
/// stream with no live process right now (between segments, in backoff) still
/// stops at its next checkpoint. If an encoder is running, its stdin gets the
/// soft-stop byte and a grace task arms the loop's kill escalation.
///
/// Returns false when no such stream exists; that call is a no-op, not an
/// error, and repeated stops are safe.
pub async fn stop_stream(registry: &StreamRegistry, id: &str, grace: Duration) -> bool {
    let record = match registry.remove(id).await {
        Some(record) => record,
        None => {
            tracing::debug!(stream_id = id, "Stop requested for unknown stream");
            return false;
        }
    };

    tracing::info!(stream_id = id, "Stopping stream");

    if let Some(handle) = record.process {
        if let Some(mut stdin) = handle.stdin {
            if let Err(e) = stdin.write_all(SOFT_STOP).await {
                tracing::debug!(stream_id = id, error = %e, "Soft-stop write failed");
            }
            let _ = stdin.flush().await;
            // Dropping stdin closes the pipe, which also ends interactive reads.
        }

        if let Some(kill_tx) = handle.kill_tx {
            let id = id.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                // Send fails if the process already exited; that is the
                // good case.
                if kill_tx.send(()).is_ok() {
                    tracing::warn!(stream_id = %id, "Encoder ignored soft stop, escalating to kill");
                }
            });
        }
    }

    true
}
