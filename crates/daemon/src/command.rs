//! Encoder argument assembly for the RTMP playout daemon.
//!
//! All ffmpeg argument vectors are built here and nowhere else, so the exact
//! flag set is auditable and testable. Two deterministic templates exist:
//! passthrough (stream copy) and transcode (scale/pad + x264 + aac).

use crate::quality::QualityPreset;
use std::path::Path;

/// Constant output frame rate for transcoded segments
const OUTPUT_FPS: u32 = 30;

/// Fixed GOP size; with scene-cut detection disabled this makes keyframe
/// placement, and therefore segment boundaries, predictable.
const GOP_SIZE: u32 = 60;

/// Muxer queue size cap
const MAX_MUXING_QUEUE_SIZE: u32 = 1024;

/// RTMP client buffer in milliseconds
const RTMP_BUFFER_MS: u32 = 100;

/// Build the ffmpeg argument vector for one segment.
///
/// `passthrough` selects the stream-copy template; otherwise the file is
/// transcoded to the preset's exact resolution with aspect-preserving
/// letterbox padding.
pub fn build_ffmpeg_args(
    path: &Path,
    rtmp_url: &str,
    preset: &QualityPreset,
    passthrough: bool,
) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();

    // Real-time paced read: the remote end is a live RTMP ingest.
    args.push("-re".to_string());
    args.push("-i".to_string());
    args.push(path.to_string_lossy().to_string());

    if passthrough {
        args.push("-c:v".to_string());
        args.push("copy".to_string());
        args.push("-c:a".to_string());
        args.push("copy".to_string());
        args.push("-flvflags".to_string());
        args.push("no_duration_filesize".to_string());
    } else {
        args.push("-vf".to_string());
        args.push(scale_pad_filter(preset));

        args.push("-c:v".to_string());
        args.push("libx264".to_string());
        args.push("-preset".to_string());
        args.push(preset.speed_preset.to_string());
        args.push("-tune".to_string());
        args.push("zerolatency".to_string());
        args.push("-profile:v".to_string());
        args.push("baseline".to_string());
        args.push("-crf".to_string());
        args.push(preset.crf.to_string());
        args.push("-b:v".to_string());
        args.push(preset.video_bitrate.to_string());
        args.push("-maxrate".to_string());
        args.push(preset.max_bitrate.to_string());
        args.push("-bufsize".to_string());
        args.push(preset.buffer_size.to_string());

        args.push("-g".to_string());
        args.push(GOP_SIZE.to_string());
        args.push("-keyint_min".to_string());
        args.push(GOP_SIZE.to_string());
        args.push("-sc_threshold".to_string());
        args.push("0".to_string());

        args.push("-r".to_string());
        args.push(OUTPUT_FPS.to_string());

        args.push("-c:a".to_string());
        args.push("aac".to_string());
        args.push("-b:a".to_string());
        args.push(preset.audio_bitrate.to_string());
        args.push("-ar".to_string());
        args.push(preset.audio_sample_rate.to_string());
        args.push("-ac".to_string());
        args.push("2".to_string());

        args.push("-threads".to_string());
        args.push(preset.threads.to_string());
        args.push("-max_muxing_queue_size".to_string());
        args.push(MAX_MUXING_QUEUE_SIZE.to_string());

        args.push("-fflags".to_string());
        args.push("+genpts".to_string());
        args.push("-avoid_negative_ts".to_string());
        args.push("make_zero".to_string());

        args.push("-rtmp_buffer".to_string());
        args.push(RTMP_BUFFER_MS.to_string());
        args.push("-rtmp_live".to_string());
        args.push("live".to_string());
    }

    args.push("-f".to_string());
    args.push("flv".to_string());
    args.push(rtmp_url.to_string());

    args
}

/// Scale to the preset resolution preserving aspect ratio, letterbox the
/// remainder, and normalize the pixel format.
fn scale_pad_filter(preset: &QualityPreset) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,format=yuv420p",
        w = preset.width,
        h = preset.height
    )
}
