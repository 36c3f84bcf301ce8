//! Stream prober boundary
//!
//! The discovery engine only needs pass/fail/auth-fail for a candidate RTSP
//! URL plus whatever media metadata the prober can report. Two probers ship:
//! a lightweight RTSP DESCRIBE client and an ffprobe wrapper.

mod ffprobe;
mod rtsp;
mod sdp;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::StreamDescriptor;

pub use ffprobe::{parse_ffprobe_output, FfprobeProber};
pub use rtsp::{build_rtsp_url, encode_userinfo, parse_digest_challenge, RtspDescribeProber, RtspTarget};
pub use sdp::{parse_sdp, SdpInfo};

pub const AUTH_INVALID: &str = "RTSP Auth Failed: Invalid credentials";
pub const AUTH_FORBIDDEN: &str = "RTSP Auth Failed: Access forbidden";
pub const STREAM_NOT_FOUND: &str = "RTSP Error: Stream not found";

/// Result of probing one stream URL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeOutcome {
    pub success: bool,
    /// Server explicitly rejected the credentials
    pub auth_failed: bool,
    pub resolution: Option<String>,
    pub codec: Option<String>,
    pub bitrate_kbps: Option<u32>,
    pub fps: Option<f32>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self {
            auth_failed: true,
            error: Some(msg.into()),
            ..Self::default()
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            error: Some(msg.into()),
            ..Self::default()
        }
    }

    /// Descriptor for `url` carrying this outcome's metadata
    pub fn to_descriptor(&self, url: &str) -> StreamDescriptor {
        let mut d = StreamDescriptor::new(url);
        if let Some(r) = &self.resolution {
            d.resolution = r.clone();
        }
        if let Some(c) = &self.codec {
            d.codec = c.clone();
        }
        d.bitrate_kbps = self.bitrate_kbps;
        d.fps = self.fps;
        d.error = if self.success { None } else { self.error.clone() };
        d
    }
}

/// Anything that can check an RTSP URL
#[async_trait]
pub trait StreamProber: Send + Sync {
    /// Probe `url`, giving up after `timeout`
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}
