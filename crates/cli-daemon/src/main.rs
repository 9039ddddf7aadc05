//! CLI entry point for the RTMP playout daemon.
//!
//! Parses command line arguments, starts one stream and the admin status
//! server, then waits for ctrl-c to stop the stream gracefully.

use clap::Parser;
use rtmp_playout::{
    new_shared_quality, run_status_server, stop_stream, Config, LogStateStore, PlayMode,
    QualityLevel, StatusReporter, StreamDescriptor, StreamRegistry, StreamSupervisor, VideoRef,
    DEFAULT_STATUS_PORT,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// RTMP Playout - supervised playlist broadcasting over RTMP
#[derive(Parser, Debug)]
#[command(name = "rtmp-playout")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// RTMP ingest URL, including the stream key
    #[arg(short, long)]
    url: String,

    /// Playlist traversal mode: play_once, loop, shuffle, shuffle_loop
    #[arg(short, long, default_value = "loop")]
    mode: PlayMode,

    /// Pin this stream to a quality level instead of the shared one
    #[arg(short, long)]
    quality: Option<QualityLevel>,

    /// Port for the admin status server
    #[arg(long, default_value_t = DEFAULT_STATUS_PORT)]
    status_port: u16,

    /// Video files to play, in playlist order
    #[arg(required = true)]
    videos: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = if args.config.exists() {
        match Config::load(&args.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        tracing::info!(path = %args.config.display(), "No config file, using defaults");
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    let initial_quality = match config.encoder.default_quality.parse::<QualityLevel>() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Invalid default_quality in config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = Arc::new(config);
    let registry = StreamRegistry::new();
    let quality = new_shared_quality(initial_quality);
    let supervisor = StreamSupervisor::new(
        registry.clone(),
        Arc::new(LogStateStore::new()),
        quality.clone(),
        config.clone(),
    );

    let stream_id = uuid::Uuid::new_v4().to_string();
    let descriptor = StreamDescriptor {
        id: stream_id.clone(),
        rtmp_url: args.url,
        videos: args.videos.iter().map(VideoRef::new).collect(),
        mode: args.mode,
        quality_override: args.quality,
    };

    if let Err(e) = supervisor.start_stream(descriptor).await {
        eprintln!("Failed to start stream: {}", e);
        return ExitCode::FAILURE;
    }
    tracing::info!(stream_id = %stream_id, "Stream started");

    let reporter = StatusReporter::new(registry.clone(), quality, config.clone());
    let status_port = args.status_port;
    tokio::spawn(async move {
        if let Err(e) = run_status_server(reporter, status_port).await {
            tracing::error!(error = %e, "Status server failed");
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to listen for shutdown signal: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown requested");
    let grace = Duration::from_secs(config.streams.stop_grace_secs);
    stop_stream(&registry, &stream_id, grace).await;

    // Leave the grace window plus a margin for the loop to tear down.
    let deadline = grace + Duration::from_secs(2);
    let drained = tokio::time::timeout(deadline, async {
        while registry.contains(&stream_id).await {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(stream_id = %stream_id, "Stream did not stop within the grace window");
    }

    ExitCode::SUCCESS
}
