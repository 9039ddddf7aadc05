//! Stream lifecycle supervision.
//!
//! `start_stream` validates and admits a stream, then spawns one long-lived
//! tokio task that drives an explicit per-stream state machine: select the
//! next segment, launch the encoder, supervise it to exit, retry with backoff
//! on failure, and tear down on stop, exhaustion or the failure ceiling.

use crate::admission::{AdmissionController, AdmissionError};
use crate::command::build_ffmpeg_args;
use crate::playlist::{PlayMode, PlaylistError, PlaylistSequencer, VideoRef};
use crate::probe;
use crate::quality::{preset_for, QualityLevel, SharedQuality};
use crate::registry::{ProcessHandle, RegisterError, StreamRegistry};
use crate::retry::{RetryDecision, RetryTracker};
use crate::state::{SharedStateStore, StateError};
use rtmp_playout_config::Config;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Error type for starting a stream
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Register(#[from] RegisterError),

    #[error(transparent)]
    Playlist(#[from] PlaylistError),
}

/// Everything needed to start one stream
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Caller-chosen unique stream id
    pub id: String,
    /// RTMP ingest URL, including any stream key
    pub rtmp_url: String,
    /// Playlist of source files
    pub videos: Vec<VideoRef>,
    /// Traversal mode
    pub mode: PlayMode,
    /// Pin this stream to a quality level instead of the shared one
    pub quality_override: Option<QualityLevel>,
}

/// Why a stream's loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TerminateReason {
    /// The registry entry was removed by a stop request
    Stopped,
    /// The playlist was exhausted under a non-looping mode
    Finished,
    /// The consecutive-failure ceiling was reached
    Failed,
}

/// Per-stream loop state. Each iteration consumes the state and produces the
/// next one; `Running` owns the live child process.
enum LoopState {
    SelectingSegment,
    Launching(VideoRef),
    Running {
        video: VideoRef,
        child: Child,
        kill_rx: oneshot::Receiver<()>,
        stderr_task: JoinHandle<Option<String>>,
    },
    RetryWait {
        video: VideoRef,
        delay: Duration,
    },
    Terminating(TerminateReason),
}

/// Owns the shared pieces every stream loop needs
#[derive(Clone)]
pub struct StreamSupervisor {
    registry: StreamRegistry,
    state: SharedStateStore,
    quality: SharedQuality,
    config: Arc<Config>,
}

impl StreamSupervisor {
    pub fn new(
        registry: StreamRegistry,
        state: SharedStateStore,
        quality: SharedQuality,
        config: Arc<Config>,
    ) -> Self {
        Self {
            registry,
            state,
            quality,
            config,
        }
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Validate, admit and register a stream, then spawn its loop.
    ///
    /// Returns as soon as the loop task is spawned; playback progress is
    /// observable through the registry and the state store.
    pub async fn start_stream(&self, descriptor: StreamDescriptor) -> Result<(), StreamError> {
        let StreamDescriptor {
            id,
            rtmp_url,
            videos,
            mode,
            quality_override,
        } = descriptor;

        let sequencer = PlaylistSequencer::new(videos, mode)?;

        let max = self.config.streams.max_concurrent as usize;
        let admission = AdmissionController::new(
            self.registry.clone(),
            max,
            self.config.streams.low_memory_warn_mb,
            self.config.encoder.ffmpeg_path.clone(),
        );
        admission.try_admit(&id).await?;

        // The admission check races other starters; this insert is binding.
        self.registry.try_register(&id, max).await?;

        tracing::info!(stream_id = %id, mode = %mode, videos = sequencer.len(), "Starting stream");
        self.report_state(&id, self.state.set_streaming(&id, true));
        self.report_state(
            &id,
            self.state.append_audit_event(
                &id,
                "START",
                &format!("{} videos, mode {}", sequencer.len(), mode),
            ),
        );

        let supervisor = self.clone();
        tokio::spawn(async move {
            supervisor
                .run_stream_loop(id, rtmp_url, sequencer, quality_override)
                .await;
        });

        Ok(())
    }

    /// Drive one stream from first segment to termination
    async fn run_stream_loop(
        self,
        id: String,
        rtmp_url: String,
        mut sequencer: PlaylistSequencer,
        quality_override: Option<QualityLevel>,
    ) {
        let mut retry = RetryTracker::with_base_delay(Duration::from_millis(
            self.config.streams.retry_base_delay_ms,
        ));
        let mut current_index = 0usize;
        let mut state = LoopState::SelectingSegment;

        loop {
            state = match state {
                LoopState::SelectingSegment => {
                    // Stop checkpoint: entry removed means stop requested.
                    if !self.registry.contains(&id).await {
                        LoopState::Terminating(TerminateReason::Stopped)
                    } else {
                        current_index = sequencer.position();
                        match sequencer.next() {
                            Some((video, _last_of_pass)) => {
                                self.report_state(
                                    &id,
                                    self.state.set_current_video(&id, Some(&video.file_name)),
                                );
                                LoopState::Launching(video)
                            }
                            None => LoopState::Terminating(TerminateReason::Finished),
                        }
                    }
                }

                LoopState::Launching(video) => {
                    self.launch_segment(
                        &id,
                        &rtmp_url,
                        video,
                        quality_override,
                        current_index,
                        &mut retry,
                    )
                    .await
                }

                LoopState::Running {
                    video,
                    mut child,
                    mut kill_rx,
                    stderr_task,
                } => {
                    let exit = tokio::select! {
                        res = child.wait() => res,
                        kill = &mut kill_rx => {
                            // A dropped sender is not a kill order.
                            if kill.is_ok() {
                                tracing::info!(stream_id = %id, "Grace window elapsed, killing encoder");
                                let _ = child.start_kill();
                            }
                            child.wait().await
                        }
                    };

                    let stderr_error = stderr_task.await.ok().flatten();

                    // Stop checkpoint: a stop that raced the exit wins.
                    if !self.registry.contains(&id).await {
                        LoopState::Terminating(TerminateReason::Stopped)
                    } else {
                        match exit {
                            Ok(status) if status.success() => {
                                retry.record_success();
                                self.registry.finish_segment(&id, 0, None).await;
                                tracing::info!(
                                    stream_id = %id,
                                    video = %video.file_name,
                                    "Segment finished cleanly"
                                );
                                let pause =
                                    Duration::from_millis(self.config.streams.inter_segment_pause_ms);
                                tokio::time::sleep(pause).await;
                                LoopState::SelectingSegment
                            }
                            exit => {
                                let error_text = describe_failure(&exit, stderr_error);
                                self.handle_failure(&id, video, error_text, &mut retry).await
                            }
                        }
                    }
                }

                LoopState::RetryWait { video, delay } => {
                    tracing::info!(
                        stream_id = %id,
                        video = %video.file_name,
                        delay_ms = delay.as_millis() as u64,
                        "Waiting before retrying segment"
                    );
                    tokio::time::sleep(delay).await;
                    // Stop checkpoint: a stream stopped during backoff must
                    // not launch one more throwaway process.
                    if !self.registry.contains(&id).await {
                        LoopState::Terminating(TerminateReason::Stopped)
                    } else {
                        LoopState::Launching(video)
                    }
                }

                LoopState::Terminating(reason) => {
                    self.terminate(&id, reason).await;
                    return;
                }
            };
        }
    }

    /// Resolve quality, probe the file, spawn the encoder and attach it to
    /// the registry record.
    async fn launch_segment(
        &self,
        id: &str,
        rtmp_url: &str,
        video: VideoRef,
        quality_override: Option<QualityLevel>,
        playlist_index: usize,
        retry: &mut RetryTracker,
    ) -> LoopState {
        // Effective quality is resolved per launch, so a shared-level change
        // applies from the next segment onward.
        let level = match quality_override {
            Some(level) => level,
            None => *self.quality.read().await,
        };
        let preset = preset_for(level);

        let ffprobe_path = self.config.encoder.ffprobe_path.clone();
        let probe_path = video.path.clone();
        let passthrough =
            tokio::task::spawn_blocking(move || probe::can_passthrough(&ffprobe_path, &probe_path))
                .await
                .unwrap_or(false);

        let args = build_ffmpeg_args(&video.path, rtmp_url, preset, passthrough);
        tracing::debug!(
            stream_id = id,
            video = %video.file_name,
            quality = %level,
            passthrough,
            "Launching encoder"
        );

        let spawned = Command::new(&self.config.encoder.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                // A launch error shares the failure path with a nonzero exit.
                return self
                    .handle_failure(id, video, format!("failed to launch encoder: {}", e), retry)
                    .await;
            }
        };

        let stdin = child.stdin.take();
        let stderr_task = match child.stderr.take() {
            Some(stderr) => tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut last_error: Option<String> = None;
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.contains("error") || line.contains("Error") {
                        last_error = Some(line);
                    }
                }
                last_error
            }),
            None => tokio::spawn(async { None }),
        };

        let (kill_tx, kill_rx) = oneshot::channel();
        let handle = ProcessHandle {
            pid: child.id(),
            stdin,
            kill_tx: Some(kill_tx),
        };

        if !self.registry.attach_process(id, handle, playlist_index).await {
            // Stop removed the record while we were spawning.
            tracing::info!(stream_id = id, "Stream stopped during launch, killing encoder");
            let _ = child.start_kill();
            let _ = child.wait().await;
            stderr_task.abort();
            return LoopState::Terminating(TerminateReason::Stopped);
        }

        LoopState::Running {
            video,
            child,
            kill_rx,
            stderr_task,
        }
    }

    /// Record a failed segment and decide between backoff and termination
    async fn handle_failure(
        &self,
        id: &str,
        video: VideoRef,
        error_text: String,
        retry: &mut RetryTracker,
    ) -> LoopState {
        let decision = retry.record_failure();
        tracing::warn!(
            stream_id = id,
            video = %video.file_name,
            failures = retry.consecutive_failures(),
            error = %error_text,
            "Segment failed"
        );
        self.registry
            .finish_segment(id, retry.consecutive_failures(), Some(error_text.clone()))
            .await;

        match decision {
            RetryDecision::RetryAfter(delay) => LoopState::RetryWait { video, delay },
            RetryDecision::GiveUp => {
                self.report_state(
                    id,
                    self.state.append_audit_event(
                        id,
                        "ERROR",
                        &format!("giving up after repeated failures: {}", error_text),
                    ),
                );
                LoopState::Terminating(TerminateReason::Failed)
            }
        }
    }

    /// Tear down registry and state store entries for a finished loop
    async fn terminate(&self, id: &str, reason: TerminateReason) {
        self.registry.remove(id).await;

        self.report_state(id, self.state.set_current_video(id, None));
        self.report_state(id, self.state.set_streaming(id, false));

        let (action, message) = match reason {
            TerminateReason::Stopped => ("STOP", "stopped by request"),
            TerminateReason::Finished => ("FINISH", "playlist complete"),
            TerminateReason::Failed => ("ERROR", "terminated after repeated failures"),
        };
        self.report_state(id, self.state.append_audit_event(id, action, message));
        tracing::info!(stream_id = id, reason = message, "Stream terminated");
    }

    /// State store writes are best-effort; a failure is logged, never fatal.
    fn report_state(&self, id: &str, result: Result<(), StateError>) {
        if let Err(e) = result {
            tracing::warn!(stream_id = id, error = %e, "State store update failed");
        }
    }
}

/// Human-readable failure description from exit status and collected stderr
fn describe_failure(
    exit: &std::io::Result<std::process::ExitStatus>,
    stderr_error: Option<String>,
) -> String {
    if let Some(line) = stderr_error {
        return line;
    }
    match exit {
        Ok(status) => format!("encoder exited with {}", status),
        Err(e) => format!("failed to wait on encoder: {}", e),
    }
}
