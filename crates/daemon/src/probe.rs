//! Media probing for encode-strategy selection.
//!
//! Inspects a file's primary video stream with ffprobe to decide whether it
//! can be relayed to the RTMP target without re-encoding. Any inspection
//! failure resolves to "transcode"; probing never fails a stream.

use std::path::Path;
use std::process::Command;

/// Target delivery codec for passthrough
const PASSTHROUGH_CODEC: &str = "h264";

/// Maximum width the RTMP target accepts without re-encoding
const PASSTHROUGH_MAX_WIDTH: u32 = 1920;

/// Parse one line of `codec_name,width` csv output from ffprobe.
///
/// Returns None for anything that is not a well-formed two-field line.
pub fn parse_probe_line(line: &str) -> Option<(String, u32)> {
    let mut fields = line.trim().split(',');
    let codec = fields.next()?.trim();
    if codec.is_empty() {
        return None;
    }
    let width = fields.next()?.trim().parse::<u32>().ok()?;
    Some((codec.to_string(), width))
}

/// Decide passthrough eligibility from probed codec and width
pub fn passthrough_eligible(codec: &str, width: u32) -> bool {
    codec.eq_ignore_ascii_case(PASSTHROUGH_CODEC) && width <= PASSTHROUGH_MAX_WIDTH
}

/// Probe a file and decide whether its streams can be relayed as-is.
///
/// Runs `ffprobe -v error -select_streams v:0 -show_entries stream=codec_name,width
/// -of csv=p=0 <path>` and checks the primary video stream against the
/// passthrough constraints. This is a blocking external-process call; callers
/// on an async runtime must run it via `spawn_blocking`.
pub fn can_passthrough(ffprobe_path: &str, path: &Path) -> bool {
    let output = Command::new(ffprobe_path)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_name,width",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output();

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ffprobe failed to run, transcoding");
            return false;
        }
    };

    if !output.status.success() {
        tracing::debug!(path = %path.display(), "ffprobe exited nonzero, transcoding");
        return false;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = match stdout.lines().next() {
        Some(line) => line,
        None => return false,
    };

    match parse_probe_line(line) {
        Some((codec, width)) => passthrough_eligible(&codec, width),
        None => {
            tracing::debug!(path = %path.display(), line, "malformed ffprobe output, transcoding");
            false
        }
    }
}

/// Check that the encoder tool is invocable on this host.
///
/// Runs `ffmpeg -version` and reports whether it executed successfully.
/// Consulted by admission before starting a stream and by the status reporter.
pub fn check_ffmpeg_available(ffmpeg_path: &str) -> bool {
    Command::new(ffmpeg_path)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
