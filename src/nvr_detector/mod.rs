//! NVR/DVR Channel Detection
//!
//! Decides whether one IP is really a multi-channel recorder and, if so,
//! produces one child device per channel. Tried in order until one yields at
//! least two channels:
//!
//! 1. ONVIF media profiles (pairs of main/sub)
//! 2. vendor HTTP APIs (Hikvision ISAPI, Dahua CGI) for a channel count
//! 3. brute-force channel templates, 3 consecutive misses end a template

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::config::DiscoveryConfig;
use crate::error::Result;
use crate::models::{Credential, Device, DiscoveryMethod, StreamDescriptor};
use crate::onvif_client::{ChannelStreams, OnvifClient};
use crate::stream_probe::{build_rtsp_url, ProbeOutcome, StreamProber};

/// Channel templates confirmed by a vendor API count, `{ch}` / `{ch:02}`
const API_TEMPLATES: &[(&str, &str)] = &[
    ("/ISAPI/Streaming/channels/{ch}01", "/ISAPI/Streaming/channels/{ch}02"),
    ("/Streaming/Channels/{ch}01", "/Streaming/Channels/{ch}02"),
    ("/cam/realmonitor?channel={ch}&subtype=0", "/cam/realmonitor?channel={ch}&subtype=1"),
];

const BRUTE_FORCE_TEMPLATES: &[(&str, &str)] = &[
    ("/ch{ch}/0", "/ch{ch}/1"),
    ("/stream{ch}", "/substream{ch}"),
    ("/live/ch{ch:02}_0", "/live/ch{ch:02}_1"),
    ("/cam{ch}", "/cam{ch}_sub"),
    ("/{ch}", "/{ch}_sub"),
];

const API_CHANNEL_CAP: u32 = 32;
const BRUTE_FORCE_CAP: u32 = 16;
const MAX_CONSECUTIVE_MISSES: u32 = 3;
const DEFAULT_RTSP_PORT: u16 = 554;

/// How the channel list was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSource {
    Onvif,
    VendorApi,
    BruteForce,
}

/// Fill `{ch}` and `{ch:02}` placeholders
pub fn expand_template(template: &str, channel: u32) -> String {
    template
        .replace("{ch:02}", &format!("{:02}", channel))
        .replace("{ch}", &channel.to_string())
}

fn capture_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("Invalid channel Regex"))
}

/// Channel count from a Hikvision `/ISAPI/System/deviceInfo` body
pub fn hikvision_channel_count(body: &str) -> Option<u32> {
    static PORTS: OnceLock<Regex> = OnceLock::new();
    static ANALOG: OnceLock<Regex> = OnceLock::new();
    let ports = capture_regex(&PORTS, r"<videoInputPortNums>\s*(\d+)\s*</videoInputPortNums>");
    let analog = capture_regex(&ANALOG, r"<analogChannelNum>\s*(\d+)\s*</analogChannelNum>");
    [ports, analog].into_iter().find_map(|re| {
        re.captures(body)
            .and_then(|c| c[1].parse::<u32>().ok())
            .filter(|n| *n > 0)
    })
}

/// Channel count from a Dahua `ChannelTitle` config dump (max index + 1)
pub fn dahua_channel_count(body: &str) -> Option<u32> {
    static TITLES: OnceLock<Regex> = OnceLock::new();
    let re = capture_regex(&TITLES, r"table\.ChannelTitle\[(\d+)\]");
    re.captures_iter(body)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .max()
        .map(|max| max + 1)
}

pub struct NvrDetector {
    onvif: OnvifClient,
    http: reqwest::Client,
    prober: Arc<dyn StreamProber>,
    probe_timeout: Duration,
    api_port: u16,
}

impl NvrDetector {
    pub fn new(onvif: OnvifClient, prober: Arc<dyn StreamProber>, config: &DiscoveryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            onvif,
            http,
            prober,
            probe_timeout: config.stream_probe_timeout,
            api_port: 80,
        })
    }

    /// HTTP port for the vendor APIs
    pub fn with_api_port(mut self, port: u16) -> Self {
        self.api_port = port;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Channel devices for `device`, empty when it is not a recorder.
    ///
    /// When channels are found the parent is kept and flagged as a recorder
    /// with the channel count; the children are returned for the caller to
    /// append.
    pub async fn detect(&self, device: &Device, cancel: &CancellationToken) -> Vec<Device> {
        let Some(cred) = device.credential() else {
            return Vec::new();
        };
        tracing::info!(ip = %device.ip(), "NVR/DVR detection");

        let mut found = self.onvif_channels(device).await;
        let mut source = ChannelSource::Onvif;

        if found.len() < 2 && !cancel.is_cancelled() {
            found = self.api_channels(device, &cred, cancel).await;
            source = ChannelSource::VendorApi;
        }
        if found.len() < 2 && !cancel.is_cancelled() {
            found = self.brute_force_channels(device, &cred, cancel).await;
            source = ChannelSource::BruteForce;
        }
        if found.len() < 2 {
            tracing::debug!(ip = %device.ip(), "not a recorder");
            return Vec::new();
        }

        tracing::info!(
            ip = %device.ip(),
            channels = found.len(),
            source = ?source,
            "Detected NVR/DVR"
        );
        device.mark_recorder(found.len() as u32);
        found
    }

    fn child(&self, device: &Device, channel: u32, main: StreamDescriptor, sub: Option<StreamDescriptor>) -> Device {
        let child = device.derive_channel(channel);
        child.set_streams(main, sub, DiscoveryMethod::NvrChannel);
        child
    }

    async fn probe(&self, url: &str) -> ProbeOutcome {
        tokio::time::timeout(
            self.probe_timeout + Duration::from_millis(250),
            self.prober.probe(url, self.probe_timeout),
        )
        .await
        .unwrap_or_else(|_| ProbeOutcome::failed("RTSP Error: Connection timed out"))
    }

    /// Stream URIs come from the device itself, so channels are kept even
    /// when probing for metadata fails.
    async fn onvif_channels(&self, device: &Device) -> Vec<Device> {
        if OnvifClient::session_for(device).is_none() {
            return Vec::new();
        }
        let channels: Vec<ChannelStreams> = match self.onvif.fetch_stream_channels(device).await {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(ip = %device.ip(), error = %e, "ONVIF profile detection failed");
                return Vec::new();
            }
        };
        if channels.len() < 2 {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(channels.len());
        for c in &channels {
            let main = self.probe(&c.main_url).await.to_descriptor(&c.main_url);
            let sub = match &c.sub_url {
                Some(url) => Some(self.probe(url).await.to_descriptor(url)),
                None => None,
            };
            out.push(self.child(device, c.index, main, sub));
        }
        out
    }

    async fn fetch_api(&self, url: &str, cred: &Credential) -> Option<String> {
        let resp = self
            .http
            .get(url)
            .basic_auth(&cred.username, Some(&cred.password))
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            tracing::debug!(url = %url, status = %resp.status(), "vendor API refused");
            return None;
        }
        resp.text().await.ok()
    }

    /// Channel count reported by a vendor management API
    async fn api_channel_count(&self, host: &str, cred: &Credential) -> Option<u32> {
        let base = format!("http://{}:{}", host, self.api_port);

        if let Some(body) = self.fetch_api(&format!("{}/ISAPI/System/deviceInfo", base), cred).await {
            if let Some(n) = hikvision_channel_count(&body) {
                return Some(n);
            }
        }

        let kind = self
            .fetch_api(&format!("{}/cgi-bin/magicBox.cgi?action=getDeviceType", base), cred)
            .await?;
        let upper = kind.to_uppercase();
        if !["NVR", "DVR", "XVR"].iter().any(|k| upper.contains(k)) {
            return None;
        }
        let titles = self
            .fetch_api(
                &format!("{}/cgi-bin/configManager.cgi?action=getConfig&name=ChannelTitle", base),
                cred,
            )
            .await?;
        dahua_channel_count(&titles)
    }

    async fn api_channels(&self, device: &Device, cred: &Credential, cancel: &CancellationToken) -> Vec<Device> {
        let host = device.host();
        let Some(count) = self.api_channel_count(&host, cred).await else {
            return Vec::new();
        };
        if count < 2 {
            return Vec::new();
        }
        tracing::debug!(ip = %device.ip(), count, "vendor API channel count");

        let limit = count.min(API_CHANNEL_CAP);
        for (main_t, sub_t) in API_TEMPLATES {
            let mut out = Vec::new();
            for ch in 1..=limit {
                if cancel.is_cancelled() {
                    return out;
                }
                match self.probe_channel(device, cred, main_t, sub_t, ch).await {
                    Probe::Found(child) => out.push(child),
                    Probe::AuthRejected => return Vec::new(),
                    Probe::Miss => {}
                }
            }
            if !out.is_empty() {
                return out;
            }
        }
        Vec::new()
    }

    async fn brute_force_channels(&self, device: &Device, cred: &Credential, cancel: &CancellationToken) -> Vec<Device> {
        for (main_t, sub_t) in BRUTE_FORCE_TEMPLATES {
            let mut out = Vec::new();
            let mut misses = 0;
            for ch in 1..=BRUTE_FORCE_CAP {
                if cancel.is_cancelled() {
                    return Vec::new();
                }
                match self.probe_channel(device, cred, main_t, sub_t, ch).await {
                    Probe::Found(child) => {
                        misses = 0;
                        out.push(child);
                    }
                    Probe::AuthRejected => return Vec::new(),
                    Probe::Miss => {
                        misses += 1;
                        if misses >= MAX_CONSECUTIVE_MISSES {
                            tracing::debug!(ip = %device.ip(), template = %main_t, "Stopping after 3 consecutive misses");
                            break;
                        }
                    }
                }
            }
            if out.len() >= 2 {
                return out;
            }
        }
        Vec::new()
    }

    async fn probe_channel(&self, device: &Device, cred: &Credential, main_t: &str, sub_t: &str, ch: u32) -> Probe {
        let host = device.host();
        let port = device.open_ports().first().copied().unwrap_or(DEFAULT_RTSP_PORT);

        let main_url = build_rtsp_url(&host, port, &expand_template(main_t, ch), Some(cred));
        let outcome = self.probe(&main_url).await;
        if outcome.auth_failed {
            tracing::warn!(ip = %device.ip(), url = %main_url, "channel probe rejected credentials");
            return Probe::AuthRejected;
        }
        if !outcome.success {
            return Probe::Miss;
        }

        let sub_url = build_rtsp_url(&host, port, &expand_template(sub_t, ch), Some(cred));
        let sub_outcome = self.probe(&sub_url).await;
        let sub = sub_outcome.success.then(|| sub_outcome.to_descriptor(&sub_url));
        Probe::Found(self.child(device, ch, outcome.to_descriptor(&main_url), sub))
    }
}

enum Probe {
    Found(Device),
    AuthRejected,
    Miss,
}
