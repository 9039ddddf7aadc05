//! Quality preset table for the RTMP playout daemon
//!
//! Maps the four quality levels to fixed encoder parameters. Selection is a
//! pure lookup over static data, never interpolated.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Error type for quality level parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QualityError {
    /// Level name is not one of the four known levels
    #[error("Unknown quality level: {0}")]
    UnknownLevel(String),
}

/// The four supported quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    UltraLow,
    Low,
    Medium,
    High,
}

impl Default for QualityLevel {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityLevel::UltraLow => write!(f, "ultra_low"),
            QualityLevel::Low => write!(f, "low"),
            QualityLevel::Medium => write!(f, "medium"),
            QualityLevel::High => write!(f, "high"),
        }
    }
}

impl FromStr for QualityLevel {
    type Err = QualityError;

    /// Parse a quality level name. Accepts the four level names with either
    /// underscore or hyphen separators; anything else is an error rather than
    /// a silent fallback.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ultra_low" | "ultra-low" | "ultralow" => Ok(QualityLevel::UltraLow),
            "low" => Ok(QualityLevel::Low),
            "medium" => Ok(QualityLevel::Medium),
            "high" => Ok(QualityLevel::High),
            other => Err(QualityError::UnknownLevel(other.to_string())),
        }
    }
}

/// Encoder parameters for one quality level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityPreset {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Target video bitrate (ffmpeg rate syntax)
    pub video_bitrate: &'static str,
    /// Maximum video bitrate
    pub max_bitrate: &'static str,
    /// Rate-control buffer size
    pub buffer_size: &'static str,
    /// x264 speed preset label
    pub speed_preset: &'static str,
    /// Constant rate factor quality setting
    pub crf: u8,
    /// Audio bitrate
    pub audio_bitrate: &'static str,
    /// Audio sample rate in Hz
    pub audio_sample_rate: u32,
    /// Encoder thread count
    pub threads: u32,
}

impl QualityPreset {
    /// Resolution as an ffmpeg-style WxH token
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

const ULTRA_LOW: QualityPreset = QualityPreset {
    width: 640,
    height: 360,
    video_bitrate: "500k",
    max_bitrate: "600k",
    buffer_size: "1000k",
    speed_preset: "ultrafast",
    crf: 28,
    audio_bitrate: "64k",
    audio_sample_rate: 44100,
    threads: 2,
};

const LOW: QualityPreset = QualityPreset {
    width: 854,
    height: 480,
    video_bitrate: "800k",
    max_bitrate: "1000k",
    buffer_size: "1600k",
    speed_preset: "superfast",
    crf: 26,
    audio_bitrate: "96k",
    audio_sample_rate: 44100,
    threads: 2,
};

const MEDIUM: QualityPreset = QualityPreset {
    width: 1280,
    height: 720,
    video_bitrate: "1500k",
    max_bitrate: "1800k",
    buffer_size: "3000k",
    speed_preset: "veryfast",
    crf: 23,
    audio_bitrate: "128k",
    audio_sample_rate: 44100,
    threads: 4,
};

const HIGH: QualityPreset = QualityPreset {
    width: 1920,
    height: 1080,
    video_bitrate: "3000k",
    max_bitrate: "3600k",
    buffer_size: "6000k",
    speed_preset: "veryfast",
    crf: 21,
    audio_bitrate: "160k",
    audio_sample_rate: 44100,
    threads: 4,
};

/// Look up the preset for a quality level
pub fn preset_for(level: QualityLevel) -> &'static QualityPreset {
    match level {
        QualityLevel::UltraLow => &ULTRA_LOW,
        QualityLevel::Low => &LOW,
        QualityLevel::Medium => &MEDIUM,
        QualityLevel::High => &HIGH,
    }
}

/// Process-wide current quality level, shared across all streams.
/// A change takes effect starting with each stream's next segment.
pub type SharedQuality = Arc<RwLock<QualityLevel>>;

/// Creates a new SharedQuality handle with the given initial level
pub fn new_shared_quality(level: QualityLevel) -> SharedQuality {
    Arc::new(RwLock::new(level))
}
