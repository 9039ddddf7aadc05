//! External state store boundary.
//!
//! The supervisor reports stream lifecycle to an external store through this
//! trait. All calls from the core are best-effort: a failing store is logged
//! and never changes playback behavior.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Error type for state store operations
#[derive(Debug, Error)]
pub enum StateError {
    /// The backing store rejected or failed the write
    #[error("State store write failed: {0}")]
    WriteFailed(String),
}

/// Where stream lifecycle updates go.
///
/// Implementations must be cheap and non-blocking; the supervisor calls these
/// inline between segments.
pub trait StateStore: Send + Sync {
    /// Record which video a stream is currently playing, or None when idle
    fn set_current_video(&self, stream_id: &str, file_name: Option<&str>) -> Result<(), StateError>;

    /// Record whether a stream is live
    fn set_streaming(&self, stream_id: &str, streaming: bool) -> Result<(), StateError>;

    /// Append one audit event for a stream
    fn append_audit_event(&self, stream_id: &str, action: &str, message: &str)
        -> Result<(), StateError>;
}

pub type SharedStateStore = Arc<dyn StateStore>;

/// One recorded audit event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub stream_id: String,
    pub action: String,
    pub message: String,
}

/// In-memory store, used by tests and available as a no-dependency default.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    current_video: Mutex<HashMap<String, Option<String>>>,
    streaming: Mutex<HashMap<String, bool>>,
    audit: Mutex<Vec<AuditEvent>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_video(&self, stream_id: &str) -> Option<Option<String>> {
        match self.current_video.lock() {
            Ok(map) => map.get(stream_id).cloned(),
            Err(_) => None,
        }
    }

    pub fn is_streaming(&self, stream_id: &str) -> bool {
        match self.streaming.lock() {
            Ok(map) => map.get(stream_id).copied().unwrap_or(false),
            Err(_) => false,
        }
    }

    pub fn audit_events(&self) -> Vec<AuditEvent> {
        match self.audit.lock() {
            Ok(events) => events.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Actions recorded for one stream, in order
    pub fn actions_for(&self, stream_id: &str) -> Vec<String> {
        self.audit_events()
            .into_iter()
            .filter(|event| event.stream_id == stream_id)
            .map(|event| event.action)
            .collect()
    }
}

impl StateStore for MemoryStateStore {
    fn set_current_video(&self, stream_id: &str, file_name: Option<&str>) -> Result<(), StateError> {
        let mut map = self
            .current_video
            .lock()
            .map_err(|_| StateError::WriteFailed("lock poisoned".to_string()))?;
        map.insert(stream_id.to_string(), file_name.map(|s| s.to_string()));
        Ok(())
    }

    fn set_streaming(&self, stream_id: &str, streaming: bool) -> Result<(), StateError> {
        let mut map = self
            .streaming
            .lock()
            .map_err(|_| StateError::WriteFailed("lock poisoned".to_string()))?;
        map.insert(stream_id.to_string(), streaming);
        Ok(())
    }

    fn append_audit_event(
        &self,
        stream_id: &str,
        action: &str,
        message: &str,
    ) -> Result<(), StateError> {
        let mut events = self
            .audit
            .lock()
            .map_err(|_| StateError::WriteFailed("lock poisoned".to_string()))?;
        events.push(AuditEvent {
            stream_id: stream_id.to_string(),
            action: action.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

/// Store that emits lifecycle updates as structured log events. Used by the
/// CLI, where no external store is wired up.
#[derive(Debug, Default)]
pub struct LogStateStore;

impl LogStateStore {
    pub fn new() -> Self {
        Self
    }
}

impl StateStore for LogStateStore {
    fn set_current_video(&self, stream_id: &str, file_name: Option<&str>) -> Result<(), StateError> {
        match file_name {
            Some(name) => tracing::info!(stream_id, video = name, "Now playing"),
            None => tracing::info!(stream_id, "No current video"),
        }
        Ok(())
    }

    fn set_streaming(&self, stream_id: &str, streaming: bool) -> Result<(), StateError> {
        tracing::info!(stream_id, streaming, "Streaming state changed");
        Ok(())
    }

    fn append_audit_event(
        &self,
        stream_id: &str,
        action: &str,
        message: &str,
    ) -> Result<(), StateError> {
        tracing::info!(stream_id, action, message, "Stream event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_records_current_video() {
        let store = MemoryStateStore::new();
        store
            .set_current_video("stream-1", Some("a.mp4"))
            .expect("write");
        assert_eq!(
            store.current_video("stream-1"),
            Some(Some("a.mp4".to_string()))
        );

        store.set_current_video("stream-1", None).expect("write");
        assert_eq!(store.current_video("stream-1"), Some(None));
    }

    #[test]
    fn test_memory_store_streaming_flag() {
        let store = MemoryStateStore::new();
        assert!(!store.is_streaming("stream-1"));

        store.set_streaming("stream-1", true).expect("write");
        assert!(store.is_streaming("stream-1"));

        store.set_streaming("stream-1", false).expect("write");
        assert!(!store.is_streaming("stream-1"));
    }

    #[test]
    fn test_memory_store_audit_order() {
        let store = MemoryStateStore::new();
        store
            .append_audit_event("stream-1", "START", "started")
            .expect("write");
        store
            .append_audit_event("stream-2", "START", "started")
            .expect("write");
        store
            .append_audit_event("stream-1", "STOP", "stopped")
            .expect("write");

        assert_eq!(store.actions_for("stream-1"), vec!["START", "STOP"]);
        assert_eq!(store.actions_for("stream-2"), vec!["START"]);
    }

    #[test]
    fn test_log_store_never_fails() {
        let store = LogStateStore::new();
        assert!(store.set_current_video("stream-1", Some("a.mp4")).is_ok());
        assert!(store.set_streaming("stream-1", true).is_ok());
        assert!(store.append_audit_event("stream-1", "START", "ok").is_ok());
    }
}
