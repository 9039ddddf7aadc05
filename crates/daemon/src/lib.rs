//! RTMP Playout Daemon
//!
//! Background service that plays video playlists into remote RTMP endpoints
//! through supervised ffmpeg processes.

pub mod admission;
pub mod command;
pub mod playlist;
pub mod probe;
pub mod quality;
pub mod registry;
pub mod retry;
pub mod shutdown;
pub mod state;
pub mod status;
pub mod status_server;
pub mod supervisor;

pub use rtmp_playout_config as config;
pub use rtmp_playout_config::Config;

pub use admission::{available_memory_mb, AdmissionController, AdmissionError};
pub use command::build_ffmpeg_args;
pub use playlist::{PlayMode, PlaylistError, PlaylistSequencer, VideoRef};
pub use probe::{can_passthrough, check_ffmpeg_available, parse_probe_line};
pub use quality::{
    new_shared_quality, preset_for, QualityError, QualityLevel, QualityPreset, SharedQuality,
};
pub use registry::{ProcessHandle, RegisterError, RunningStream, RunningStreamInfo, StreamRegistry};
pub use retry::{RetryDecision, RetryTracker};
pub use shutdown::stop_stream;
pub use state::{
    AuditEvent, LogStateStore, MemoryStateStore, SharedStateStore, StateError, StateStore,
};
pub use status::{StatusReport, StatusReporter};
pub use status_server::{create_status_router, run_status_server, ServerError, DEFAULT_STATUS_PORT};
pub use supervisor::{StreamDescriptor, StreamError, StreamSupervisor};
