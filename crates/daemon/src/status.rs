//! Point-in-time daemon status.
//!
//! A report is a pure read over the registry, the shared quality level, a
//! system memory probe and an encoder availability check. Nothing here
//! mutates stream state.

use crate::admission::available_memory_mb;
use crate::probe;
use crate::quality::{QualityLevel, SharedQuality};
use crate::registry::StreamRegistry;
use rtmp_playout_config::Config;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Snapshot served by the admin endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Streams currently registered
    pub active_streams: usize,
    /// Configured concurrency ceiling
    pub max_streams: usize,
    /// Available system memory in MB. The consuming endpoint expects the
    /// capitalized unit, which camelCase alone would not produce.
    #[serde(rename = "availableMemoryMB")]
    pub available_memory_mb: u64,
    /// Process-wide quality level
    pub current_quality: QualityLevel,
    /// Whether the encoder binary is invocable
    pub ffmpeg_available: bool,
}

/// Builds status reports from the daemon's shared handles
#[derive(Clone)]
pub struct StatusReporter {
    registry: StreamRegistry,
    quality: SharedQuality,
    config: Arc<Config>,
}

impl StatusReporter {
    pub fn new(registry: StreamRegistry, quality: SharedQuality, config: Arc<Config>) -> Self {
        Self {
            registry,
            quality,
            config,
        }
    }

    pub fn quality(&self) -> &SharedQuality {
        &self.quality
    }

    /// Assemble a fresh report
    pub async fn report(&self) -> StatusReport {
        let ffmpeg_path = self.config.encoder.ffmpeg_path.clone();
        let ffmpeg_available =
            tokio::task::spawn_blocking(move || probe::check_ffmpeg_available(&ffmpeg_path))
                .await
                .unwrap_or(false);

        StatusReport {
            active_streams: self.registry.len().await,
            max_streams: self.config.streams.max_concurrent as usize,
            available_memory_mb: available_memory_mb(),
            current_quality: *self.quality.read().await,
            ffmpeg_available,
        }
    }
}
