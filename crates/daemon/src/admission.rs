//! Admission control for new streams.
//!
//! Answers "may this stream start right now" from registry occupancy, the
//! configured concurrency ceiling and encoder availability. The check itself
//! has no side effect; the binding slot reservation is the registry's
//! `try_register`, which re-checks both conditions under its lock.

use crate::probe;
use crate::registry::StreamRegistry;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use thiserror::Error;

/// Error type for admission decisions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    /// A stream with this id is already running
    #[error("Stream {0} is already running")]
    Duplicate(String),

    /// All concurrent stream slots are occupied
    #[error("Concurrent stream ceiling reached ({active}/{max})")]
    CeilingReached { active: usize, max: usize },

    /// The encoder binary could not be executed
    #[error("Encoder is not available on this host")]
    EncoderUnavailable,
}

/// Available system memory in megabytes
pub fn available_memory_mb() -> u64 {
    let sys = System::new_with_specifics(
        RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
    );
    sys.available_memory() / (1024 * 1024)
}

/// Admission gate for new streams
pub struct AdmissionController {
    registry: StreamRegistry,
    max_streams: usize,
    low_memory_warn_mb: u64,
    ffmpeg_path: String,
}

impl AdmissionController {
    pub fn new(
        registry: StreamRegistry,
        max_streams: usize,
        low_memory_warn_mb: u64,
        ffmpeg_path: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            max_streams,
            low_memory_warn_mb,
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Check whether a stream with this id may start.
    ///
    /// Low available memory is a warning, never a rejection.
    pub async fn try_admit(&self, id: &str) -> Result<(), AdmissionError> {
        if self.registry.contains(id).await {
            return Err(AdmissionError::Duplicate(id.to_string()));
        }

        let active = self.registry.len().await;
        if active >= self.max_streams {
            return Err(AdmissionError::CeilingReached {
                active,
                max: self.max_streams,
            });
        }

        let ffmpeg_path = self.ffmpeg_path.clone();
        let encoder_ok = tokio::task::spawn_blocking(move || {
            probe::check_ffmpeg_available(&ffmpeg_path)
        })
        .await
        .unwrap_or(false);
        if !encoder_ok {
            return Err(AdmissionError::EncoderUnavailable);
        }

        let available_mb = available_memory_mb();
        if available_mb < self.low_memory_warn_mb {
            tracing::warn!(
                stream_id = id,
                available_mb,
                threshold_mb = self.low_memory_warn_mb,
                "Available memory is low, admitting anyway"
            );
        }

        Ok(())
    }
}
