//! Registry of currently running streams.
//!
//! Single source of truth for "is this stream active". One mutex guards the
//! whole map; every insert, update and removal is atomic with respect to the
//! others. Absence of an entry is the authoritative stop signal observed by
//! each stream's supervisor loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::process::ChildStdin;
use tokio::sync::{oneshot, Mutex};

/// Error type for stream registration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// A record for this stream id already exists
    #[error("Stream {0} is already running")]
    AlreadyRunning(String),

    /// The concurrency ceiling has been reached
    #[error("Concurrent stream ceiling reached ({active}/{max})")]
    CeilingReached { active: usize, max: usize },
}

/// Control handle for one running encoder process
#[derive(Debug)]
pub struct ProcessHandle {
    /// OS process id, if the runtime reported one
    pub pid: Option<u32>,
    /// Piped stdin for the one-byte soft-stop signal
    pub stdin: Option<ChildStdin>,
    /// Fires the owning loop's forced-kill escalation
    pub kill_tx: Option<oneshot::Sender<()>>,
}

/// Mutable record for one running stream, owned by the registry and written
/// only by the supervisor loop that owns the stream id.
#[derive(Debug)]
pub struct RunningStream {
    /// Handle of the currently running process; None between segments and
    /// before the first launch
    pub process: Option<ProcessHandle>,
    /// When the current process was launched (registration time until then)
    pub started_at: Instant,
    /// Current position in the playlist
    pub playlist_index: usize,
    /// Consecutive failures for the current segment
    pub retries: u32,
    /// Last observed error text from the encoder
    pub last_error: Option<String>,
    /// Segments started over this stream's lifetime
    pub segments_started: u64,
}

impl RunningStream {
    fn new() -> Self {
        Self {
            process: None,
            started_at: Instant::now(),
            playlist_index: 0,
            retries: 0,
            last_error: None,
            segments_started: 0,
        }
    }
}

/// Plain-data view of a running stream record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningStreamInfo {
    pub pid: Option<u32>,
    pub playlist_index: usize,
    pub retries: u32,
    pub last_error: Option<String>,
    pub segments_started: u64,
}

/// Concurrency-safe map from stream id to its running record
#[derive(Debug, Clone, Default)]
pub struct StreamRegistry {
    inner: Arc<Mutex<HashMap<String, RunningStream>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-if-absent, enforcing the concurrency ceiling under the same
    /// lock. This is the serialization point for racing admission attempts.
    pub async fn try_register(&self, id: &str, max: usize) -> Result<(), RegisterError> {
        let mut map = self.inner.lock().await;
        if map.contains_key(id) {
            return Err(RegisterError::AlreadyRunning(id.to_string()));
        }
        if map.len() >= max {
            return Err(RegisterError::CeilingReached {
                active: map.len(),
                max,
            });
        }
        map.insert(id.to_string(), RunningStream::new());
        Ok(())
    }

    /// Whether a record exists for this stream id
    pub async fn contains(&self, id: &str) -> bool {
        self.inner.lock().await.contains_key(id)
    }

    /// Number of active records
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Remove and return the record for this stream id.
    ///
    /// Removal is the linearization point for "this stream is stopped";
    /// whichever of the stop coordinator and the supervisor loop removes
    /// first is authoritative.
    pub async fn remove(&self, id: &str) -> Option<RunningStream> {
        self.inner.lock().await.remove(id)
    }

    /// Attach a freshly launched process to the record, counting the segment
    /// start. Returns false if the record is gone (stop won the race); the
    /// caller must then tear the process down instead of supervising it.
    pub async fn attach_process(
        &self,
        id: &str,
        handle: ProcessHandle,
        playlist_index: usize,
    ) -> bool {
        let mut map = self.inner.lock().await;
        match map.get_mut(id) {
            Some(record) => {
                record.process = Some(handle);
                record.started_at = Instant::now();
                record.playlist_index = playlist_index;
                record.segments_started += 1;
                true
            }
            None => false,
        }
    }

    /// Clear the process handle and record the segment outcome. Returns false
    /// if the record no longer exists.
    pub async fn finish_segment(
        &self,
        id: &str,
        retries: u32,
        last_error: Option<String>,
    ) -> bool {
        let mut map = self.inner.lock().await;
        match map.get_mut(id) {
            Some(record) => {
                record.process = None;
                record.retries = retries;
                if last_error.is_some() {
                    record.last_error = last_error;
                }
                true
            }
            None => false,
        }
    }

    /// Plain-data snapshot of one record
    pub async fn info(&self, id: &str) -> Option<RunningStreamInfo> {
        let map = self.inner.lock().await;
        map.get(id).map(|record| RunningStreamInfo {
            pid: record.process.as_ref().and_then(|p| p.pid),
            playlist_index: record.playlist_index,
            retries: record.retries,
            last_error: record.last_error.clone(),
            segments_started: record.segments_started,
        })
    }

    /// Ids of all active streams
    pub async fn active_ids(&self) -> Vec<String> {
        self.inner.lock().await.keys().cloned().collect()
    }
}
