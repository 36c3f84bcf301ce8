//! ffprobe-backed prober

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{ProbeOutcome, StreamProber, AUTH_FORBIDDEN, AUTH_INVALID, STREAM_NOT_FOUND};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    bit_rate: Option<String>,
}

fn parse_rate(rate: &str) -> Option<f32> {
    let (num, den) = rate.split_once('/').unwrap_or((rate, "1"));
    let (num, den): (f32, f32) = (num.trim().parse().ok()?, den.trim().parse().ok()?);
    (den > 0.0 && num > 0.0).then(|| ((num / den) * 100.0).round() / 100.0)
}

fn classify_stderr(stderr: &str) -> ProbeOutcome {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("401") || lower.contains("unauthorized") {
        ProbeOutcome::auth_failed(AUTH_INVALID)
    } else if lower.contains("403") || lower.contains("forbidden") {
        ProbeOutcome::auth_failed(AUTH_FORBIDDEN)
    } else if lower.contains("404") || lower.contains("not found") {
        ProbeOutcome::failed(STREAM_NOT_FOUND)
    } else if lower.contains("connection refused") {
        ProbeOutcome::failed("RTSP Error: Connection refused")
    } else if lower.contains("timed out") {
        ProbeOutcome::failed("RTSP Error: Connection timed out")
    } else {
        let first = stderr.lines().map(str::trim).find(|l| !l.is_empty());
        ProbeOutcome::failed(format!("RTSP Error: {}", first.unwrap_or("unknown ffprobe failure")))
    }
}

/// Interpret ffprobe's JSON stdout (and stderr on failure)
pub fn parse_ffprobe_output(success: bool, stdout: &str, stderr: &str) -> ProbeOutcome {
    if !success {
        return classify_stderr(stderr);
    }
    let parsed: FfprobeOutput = match serde_json::from_str(stdout) {
        Ok(p) => p,
        Err(e) => return ProbeOutcome::failed(format!("RTSP Error: unreadable ffprobe output: {}", e)),
    };
    let Some(video) = parsed.streams.into_iter().next() else {
        return ProbeOutcome::failed("RTSP Error: no video stream");
    };

    ProbeOutcome {
        success: true,
        codec: video.codec_name.map(|c| c.to_uppercase()),
        resolution: match (video.width, video.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{}x{}", w, h)),
            _ => None,
        },
        fps: video
            .avg_frame_rate
            .as_deref()
            .and_then(parse_rate)
            .or_else(|| video.r_frame_rate.as_deref().and_then(parse_rate)),
        bitrate_kbps: video
            .bit_rate
            .and_then(|b| b.parse::<u64>().ok())
            .map(|bps| (bps / 1000) as u32),
        ..ProbeOutcome::default()
    }
}

/// Runs `ffprobe` against the URL
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: String,
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self {
            binary: std::env::var("IPCAM_FFPROBE").unwrap_or_else(|_| "ffprobe".to_string()),
        }
    }
}

impl FfprobeProber {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl StreamProber for FfprobeProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        // -timeout is in microseconds
        let io_timeout = (timeout.as_micros() as u64).to_string();
        let child = Command::new(&self.binary)
            .args([
                "-v", "error",
                "-rtsp_transport", "tcp",
                "-timeout", &io_timeout,
                "-select_streams", "v:0",
                "-show_entries", "stream=codec_name,width,height,avg_frame_rate,r_frame_rate,bit_rate",
                "-of", "json",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::failed(format!("ffprobe spawn failed: {}", e)),
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => parse_ffprobe_output(
                output.status.success(),
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            ),
            Ok(Err(e)) => ProbeOutcome::failed(format!("ffprobe failed: {}", e)),
            Err(_) => ProbeOutcome::failed("RTSP Error: Connection timed out"),
        }
    }
}
