//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Stream supervision configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamsConfig {
    /// Maximum number of concurrently running streams (default 2)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
    /// Pause between successful segments, in milliseconds (default 1000)
    #[serde(default = "default_inter_segment_pause_ms")]
    pub inter_segment_pause_ms: u64,
    /// First retry backoff delay, in milliseconds; doubles once (default 5000)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Grace window between the soft-stop signal and a forced kill, in seconds (default 3)
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    /// Available-memory threshold below which admission logs a warning, in MB (default 512)
    #[serde(default = "default_low_memory_warn_mb")]
    pub low_memory_warn_mb: u64,
}

fn default_max_concurrent() -> u32 {
    2
}

fn default_inter_segment_pause_ms() -> u64 {
    1000
}

fn default_retry_base_delay_ms() -> u64 {
    5000
}

fn default_stop_grace_secs() -> u64 {
    3
}

fn default_low_memory_warn_mb() -> u64 {
    512
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            inter_segment_pause_ms: default_inter_segment_pause_ms(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            stop_grace_secs: default_stop_grace_secs(),
            low_memory_warn_mb: default_low_memory_warn_mb(),
        }
    }
}

/// External encoder tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderConfig {
    /// Path or name of the ffmpeg binary (default "ffmpeg")
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Path or name of the ffprobe binary (default "ffprobe")
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    /// Initial process-wide quality level name (default "medium")
    #[serde(default = "default_quality")]
    pub default_quality: String,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_quality() -> String {
    "medium".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            default_quality: default_quality(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub streams: StreamsConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - PLAYOUT_MAX_CONCURRENT_STREAMS -> streams.max_concurrent
    /// - PLAYOUT_INTER_SEGMENT_PAUSE_MS -> streams.inter_segment_pause_ms
    /// - PLAYOUT_RETRY_BASE_DELAY_MS -> streams.retry_base_delay_ms
    /// - PLAYOUT_STOP_GRACE_SECS -> streams.stop_grace_secs
    /// - PLAYOUT_LOW_MEMORY_WARN_MB -> streams.low_memory_warn_mb
    /// - PLAYOUT_FFMPEG_PATH -> encoder.ffmpeg_path
    /// - PLAYOUT_FFPROBE_PATH -> encoder.ffprobe_path
    /// - PLAYOUT_DEFAULT_QUALITY -> encoder.default_quality
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PLAYOUT_MAX_CONCURRENT_STREAMS") {
            if let Ok(max) = val.parse::<u32>() {
                self.streams.max_concurrent = max;
            }
        }

        if let Ok(val) = env::var("PLAYOUT_INTER_SEGMENT_PAUSE_MS") {
            if let Ok(pause) = val.parse::<u64>() {
                self.streams.inter_segment_pause_ms = pause;
            }
        }

        if let Ok(val) = env::var("PLAYOUT_RETRY_BASE_DELAY_MS") {
            if let Ok(delay) = val.parse::<u64>() {
                self.streams.retry_base_delay_ms = delay;
            }
        }

        if let Ok(val) = env::var("PLAYOUT_STOP_GRACE_SECS") {
            if let Ok(grace) = val.parse::<u64>() {
                self.streams.stop_grace_secs = grace;
            }
        }

        if let Ok(val) = env::var("PLAYOUT_LOW_MEMORY_WARN_MB") {
            if let Ok(mb) = val.parse::<u64>() {
                self.streams.low_memory_warn_mb = mb;
            }
        }

        if let Ok(val) = env::var("PLAYOUT_FFMPEG_PATH") {
            if !val.is_empty() {
                self.encoder.ffmpeg_path = val;
            }
        }

        if let Ok(val) = env::var("PLAYOUT_FFPROBE_PATH") {
            if !val.is_empty() {
                self.encoder.ffprobe_path = val;
            }
        }

        if let Ok(val) = env::var("PLAYOUT_DEFAULT_QUALITY") {
            if !val.is_empty() {
                self.encoder.default_quality = val;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear all config-related env vars
    fn clear_env_vars() {
        env::remove_var("PLAYOUT_MAX_CONCURRENT_STREAMS");
        env::remove_var("PLAYOUT_INTER_SEGMENT_PAUSE_MS");
        env::remove_var("PLAYOUT_RETRY_BASE_DELAY_MS");
        env::remove_var("PLAYOUT_STOP_GRACE_SECS");
        env::remove_var("PLAYOUT_LOW_MEMORY_WARN_MB");
        env::remove_var("PLAYOUT_FFMPEG_PATH");
        env::remove_var("PLAYOUT_FFPROBE_PATH");
        env::remove_var("PLAYOUT_DEFAULT_QUALITY");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_parses_all_sections(
            max_concurrent in 1u32..16,
            pause_ms in 0u64..10_000,
            retry_ms in 0u64..60_000,
            grace_secs in 0u64..30,
            warn_mb in 0u64..16_384,
        ) {
            let toml_str = format!(
                r#"
[streams]
max_concurrent = {}
inter_segment_pause_ms = {}
retry_base_delay_ms = {}
stop_grace_secs = {}
low_memory_warn_mb = {}

[encoder]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
ffprobe_path = "/opt/ffmpeg/bin/ffprobe"
default_quality = "high"
"#,
                max_concurrent, pause_ms, retry_ms, grace_secs, warn_mb
            );

            let config = Config::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(config.streams.max_concurrent, max_concurrent);
            prop_assert_eq!(config.streams.inter_segment_pause_ms, pause_ms);
            prop_assert_eq!(config.streams.retry_base_delay_ms, retry_ms);
            prop_assert_eq!(config.streams.stop_grace_secs, grace_secs);
            prop_assert_eq!(config.streams.low_memory_warn_mb, warn_mb);
            prop_assert_eq!(config.encoder.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
            prop_assert_eq!(config.encoder.ffprobe_path, "/opt/ffmpeg/bin/ffprobe");
            prop_assert_eq!(config.encoder.default_quality, "high");
        }

        #[test]
        fn prop_env_overrides_max_concurrent(
            initial in 1u32..8,
            override_val in 1u32..16,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!(
                r#"
[streams]
max_concurrent = {}
"#,
                initial
            );

            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("PLAYOUT_MAX_CONCURRENT_STREAMS", override_val.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.streams.max_concurrent, override_val);
        }

        #[test]
        fn prop_env_overrides_ffmpeg_path(
            path in "[a-z/]{1,30}",
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let mut config = Config::default();

            env::set_var("PLAYOUT_FFMPEG_PATH", &path);
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.encoder.ffmpeg_path, path);
        }

        #[test]
        fn prop_env_overrides_stop_grace(
            initial in 0u64..10,
            override_val in 0u64..30,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!(
                r#"
[streams]
stop_grace_secs = {}
"#,
                initial
            );

            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("PLAYOUT_STOP_GRACE_SECS", override_val.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.streams.stop_grace_secs, override_val);
        }
    }

    // Test that missing sections use defaults
    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_toml("").expect("Empty TOML should parse");

        assert_eq!(config.streams.max_concurrent, 2);
        assert_eq!(config.streams.inter_segment_pause_ms, 1000);
        assert_eq!(config.streams.retry_base_delay_ms, 5000);
        assert_eq!(config.streams.stop_grace_secs, 3);
        assert_eq!(config.streams.low_memory_warn_mb, 512);
        assert_eq!(config.encoder.ffmpeg_path, "ffmpeg");
        assert_eq!(config.encoder.ffprobe_path, "ffprobe");
        assert_eq!(config.encoder.default_quality, "medium");
    }

    // Test partial config with some sections missing
    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let toml_str = r#"
[streams]
max_concurrent = 4
"#;
        let config = Config::parse_toml(toml_str).expect("Partial TOML should parse");

        assert_eq!(config.streams.max_concurrent, 4);
        assert_eq!(config.streams.inter_segment_pause_ms, 1000); // default
        assert_eq!(config.encoder.ffmpeg_path, "ffmpeg"); // default
    }

    #[test]
    fn test_invalid_env_value_keeps_existing() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::default();
        env::set_var("PLAYOUT_MAX_CONCURRENT_STREAMS", "not-a-number");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config.streams.max_concurrent, 2);
    }
}
