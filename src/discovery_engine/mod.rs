//! DiscoveryEngine - one full discovery run
//!
//! ## Phases
//!
//! 1. Validate the request (a bad request becomes a single run-level error)
//! 2. WS-Discovery
//! 3. Port scan over the requested range
//! 4. Merge both passes by IP
//! 5. Credential rotation and stream discovery per device
//!
//! An overall timeout cancels the run cooperatively; whatever was gathered by
//! then is still reported.
//!
//! `discover` also hands back the device records, so devices that failed can
//! be probed again with other credentials through `retry`.

mod types;

pub use types::{DeviceError, DeviceResult, DiscoveryRequest, DiscoveryResult};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::DiscoveryConfig;
use crate::device_prober::DeviceProber;
use crate::ipcam_scan::{self, PortScanner, WSD_MULTICAST, WSD_PORT};
use crate::error::Result;
use crate::models::{Device, DeviceSet, Phase, ProgressEvent, ProgressListener};
use crate::nvr_detector::NvrDetector;
use crate::onvif_client::OnvifClient;
use crate::rtsp_patterns::{PatternCache, PatternManager};
use crate::stream_probe::StreamProber;

fn notify(listener: &Option<Arc<dyn ProgressListener>>, event: ProgressEvent) {
    if let Some(l) = listener {
        l.on_progress(&event);
    }
}

/// A finished run: the serialisable summary and the live device records
pub struct DiscoveryRun {
    pub result: DiscoveryResult,
    /// Probed devices in result order, recorder channels after their parent
    pub devices: Vec<Arc<Device>>,
}

impl DiscoveryRun {
    fn failed(result: DiscoveryResult) -> Self {
        Self {
            result,
            devices: Vec::new(),
        }
    }
}

/// Runs discovery requests; the pattern cache lives as long as the engine
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    prober: Arc<dyn StreamProber>,
    patterns: Arc<PatternManager>,
    cache: Arc<PatternCache>,
    ws_target: SocketAddr,
    nvr_api_port: Option<u16>,
}

impl DiscoveryEngine {
    /// Patterns are loaded from `config.pattern_file`; a missing or unreadable
    /// file leaves the built-in table in place.
    pub fn new(config: DiscoveryConfig, prober: Arc<dyn StreamProber>) -> Self {
        let patterns = match PatternManager::load(&config.pattern_file) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(path = %config.pattern_file.display(), error = %e, "Pattern file unusable, using built-in patterns");
                PatternManager::builtin()
            }
        };
        tracing::debug!(vendors = ?patterns.vendors(), "RTSP pattern families loaded");
        Self {
            config,
            prober,
            patterns: Arc::new(patterns),
            cache: Arc::new(PatternCache::new()),
            ws_target: SocketAddr::from((WSD_MULTICAST, WSD_PORT)),
            nvr_api_port: None,
        }
    }

    pub fn with_patterns(mut self, patterns: PatternManager) -> Self {
        self.patterns = Arc::new(patterns);
        self
    }

    /// Send the WS-Discovery probe somewhere other than the multicast group
    pub fn with_ws_target(mut self, target: SocketAddr) -> Self {
        self.ws_target = target;
        self
    }

    /// HTTP port for recorder vendor APIs (default 80)
    pub fn with_nvr_api_port(mut self, port: u16) -> Self {
        self.nvr_api_port = Some(port);
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<PatternCache> {
        &self.cache
    }

    /// Execute one request. Never fails: problems are reported in the result.
    pub async fn run(
        &self,
        request: &DiscoveryRequest,
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> DiscoveryResult {
        self.run_with_cancel(request, listener, CancellationToken::new())
            .await
    }

    /// As `run`, with an externally controlled cancellation token
    pub async fn run_with_cancel(
        &self,
        request: &DiscoveryRequest,
        listener: Option<Arc<dyn ProgressListener>>,
        cancel: CancellationToken,
    ) -> DiscoveryResult {
        self.discover(request, listener, cancel).await.result
    }

    /// Probe stage configured from `request`
    fn device_prober(&self, request: &DiscoveryRequest) -> Result<DeviceProber> {
        let mut config = self.config.clone();
        if request.continue_on_auth_failure {
            config.abort_on_auth_failure = false;
        }

        let mut prober = DeviceProber::new(
            config.clone(),
            self.prober.clone(),
            self.patterns.clone(),
            self.cache.clone(),
        )?
        .with_rtsp_guess(request.enable_rtsp_guess)
        .with_nvr_detection(request.enable_nvr);

        if let Some(workers) = request.workers {
            prober = prober.with_workers(workers);
        }
        if let Some(port) = self.nvr_api_port {
            let onvif = OnvifClient::new(config.http_timeout)?;
            let nvr = NvrDetector::new(onvif, self.prober.clone(), &config)?;
            prober = prober.with_nvr(nvr.with_api_port(port));
        }
        Ok(prober)
    }

    /// Probe `devices` again with the credentials and toggles of `request`.
    ///
    /// Only devices without a stream or recorder flag are retried; the
    /// records are updated in place. `request.ip_range` is not used.
    pub async fn retry(
        &self,
        devices: &[Arc<Device>],
        request: &DiscoveryRequest,
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> DiscoveryRun {
        let discovery_time = Utc::now();
        let started = Instant::now();
        let elapsed_ms = || started.elapsed().as_millis() as u64;

        if request.credentials.is_empty() {
            return DiscoveryRun::failed(DiscoveryResult::failed(
                discovery_time,
                elapsed_ms(),
                "Configuration error",
                "At least one credential is required",
            ));
        }
        let prober = match self.device_prober(request) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build device prober");
                return DiscoveryRun::failed(DiscoveryResult::failed(
                    discovery_time,
                    elapsed_ms(),
                    "Discovery failed",
                    e.to_string(),
                ));
            }
        };

        let failed: Vec<Arc<Device>> = devices
            .iter()
            .filter(|d| !d.has_stream() && !d.is_recorder())
            .cloned()
            .collect();
        tracing::info!(
            devices = failed.len(),
            credentials = request.credentials.len(),
            "Retrying failed devices"
        );
        notify(
            &listener,
            ProgressEvent::new(Phase::Authentication, 0, failed.len(), "Retrying credentials"),
        );

        let devices = if failed.is_empty() {
            failed
        } else {
            Arc::new(prober)
                .probe_all(failed, request.credentials.clone(), listener.clone(), CancellationToken::new())
                .await
        };

        let result = DiscoveryResult::from_devices(&devices, discovery_time, elapsed_ms());
        notify(
            &listener,
            ProgressEvent::new(
                Phase::Completed,
                result.successful_devices,
                result.total_devices,
                "Retry completed",
            ),
        );
        tracing::info!(
            total = result.total_devices,
            successful = result.successful_devices,
            "Retry finished"
        );
        DiscoveryRun { result, devices }
    }

    /// Full run returning the device records alongside the result
    pub async fn discover(
        &self,
        request: &DiscoveryRequest,
        listener: Option<Arc<dyn ProgressListener>>,
        cancel: CancellationToken,
    ) -> DiscoveryRun {
        let discovery_time = Utc::now();
        let started = Instant::now();
        let elapsed_ms = || started.elapsed().as_millis() as u64;

        let ips = match request.validate() {
            Ok(ips) => ips,
            Err(e) => {
                tracing::error!(error = %e, "Invalid discovery request");
                return DiscoveryRun::failed(DiscoveryResult::failed(
                    discovery_time,
                    elapsed_ms(),
                    "Configuration error",
                    e.to_string(),
                ));
            }
        };

        let prober = match self.device_prober(request) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build device prober");
                return DiscoveryRun::failed(DiscoveryResult::failed(
                    discovery_time,
                    elapsed_ms(),
                    "Discovery failed",
                    e.to_string(),
                ));
            }
        };
        let config = &self.config;

        let timer = request.timeout_secs.map(|secs| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                tracing::warn!(secs, "Discovery timeout reached - cancelling");
                cancel.cancel();
            })
        });

        tracing::info!(
            range = %request.ip_range,
            hosts = ips.len(),
            credentials = request.credentials.len(),
            "Discovery started"
        );

        let mut set = DeviceSet::new();

        notify(&listener, ProgressEvent::new(Phase::OnvifDiscovery, 0, 1, "Starting ONVIF discovery"));
        if request.enable_onvif && !cancel.is_cancelled() {
            match ipcam_scan::ws_discover(self.ws_target, config.wsd_window, &cancel).await {
                Ok(found) => {
                    notify(
                        &listener,
                        ProgressEvent::new(
                            Phase::OnvifDiscovery,
                            1,
                            1,
                            format!("Found {} ONVIF devices", found.len()),
                        ),
                    );
                    set.extend(found);
                }
                Err(e) => tracing::warn!(error = %e, "WS-Discovery failed"),
            }
        }

        if request.enable_port_scan && !cancel.is_cancelled() {
            notify(
                &listener,
                ProgressEvent::new(Phase::PortScanning, 0, ips.len(), "Starting port scan"),
            );
            let scanner = PortScanner::from_config(config);
            let found = scanner.scan(&ips, listener.clone(), &cancel).await;
            set.extend(found);
        }

        let devices = if set.is_empty() || cancel.is_cancelled() {
            set.to_vec()
        } else {
            notify(
                &listener,
                ProgressEvent::new(Phase::Authentication, 0, set.len(), "Testing credentials"),
            );
            Arc::new(prober)
                .probe_all(set.to_vec(), request.credentials.clone(), listener.clone(), cancel.clone())
                .await
        };

        if let Some(timer) = timer {
            timer.abort();
        }

        let result = DiscoveryResult::from_devices(&devices, discovery_time, elapsed_ms());
        notify(
            &listener,
            ProgressEvent::new(
                Phase::Completed,
                result.successful_devices,
                result.total_devices,
                "Discovery completed",
            ),
        );
        let cached_patterns = self.cache.len().await;
        tracing::info!(
            total = result.total_devices,
            successful = result.successful_devices,
            failed = result.failed_devices,
            duration_ms = result.duration_ms,
            cancelled = cancel.is_cancelled(),
            cached_patterns,
            "Discovery finished"
        );
        DiscoveryRun { result, devices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthMethod, Credential, DiscoveryMethod};
    use crate::test_support::{FakeOnvif, FakeProber, Reply};
    use parking_lot::Mutex;
    use tokio::net::UdpSocket;

    fn config(scan_port: u16) -> DiscoveryConfig {
        DiscoveryConfig {
            pattern_file: "does-not-exist/rtsp-urls.txt".into(),
            connect_timeout: Duration::from_millis(300),
            http_timeout: Duration::from_secs(2),
            stream_probe_timeout: Duration::from_millis(200),
            wsd_window: Duration::from_millis(500),
            scan_ports: vec![scan_port],
            ..DiscoveryConfig::default()
        }
    }

    /// Answers the first probe with a ProbeMatch for `xaddr`
    async fn ws_responder(xaddr: String) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            let (_, from) = socket.recv_from(&mut buf).await.unwrap();
            let reply = format!(
                "<e:Envelope><e:Body><d:ProbeMatches><d:ProbeMatch><d:XAddrs>{}</d:XAddrs></d:ProbeMatch></d:ProbeMatches></e:Body></e:Envelope>",
                xaddr
            );
            socket.send_to(reply.as_bytes(), from).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_full_run_merges_both_passes() {
        let fake = FakeOnvif::new("admin", "secret");
        let service = fake.spawn().await;
        let port = reqwest::Url::parse(&service).unwrap().port().unwrap();
        let ws = ws_responder(service.clone()).await;

        let engine = DiscoveryEngine::new(config(port), Arc::new(FakeProber::new(|_| Reply::Ok)))
            .with_ws_target(ws);

        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = phases.clone();
        let listener: Arc<dyn ProgressListener> = Arc::new(move |e: &ProgressEvent| sink.lock().push(e.phase));

        let mut request = DiscoveryRequest::new("127.0.0.1", vec![Credential::new("admin", "secret")]);
        request.enable_nvr = false;
        let result = engine.run(&request, Some(listener)).await;

        // Found by WS-Discovery and by the port scan, reported once
        assert_eq!(result.total_devices, 1);
        assert_eq!(result.successful_devices, 1);
        let dev = &result.devices[0];
        assert_eq!(dev.ip, "127.0.0.1");
        assert_eq!(dev.vendor.as_deref(), Some("Hikvision"));
        assert_eq!(dev.name.as_deref(), Some("cam-lobby"));
        assert_eq!(dev.discovery_method, Some(DiscoveryMethod::Onvif));
        assert_eq!(dev.authentication_method, Some(AuthMethod::Digest));
        assert!(dev.main_stream.as_ref().unwrap().url.contains("/onvif/Profile_1"));

        let phases = phases.lock().clone();
        assert!(phases.contains(&Phase::OnvifDiscovery));
        assert!(phases.contains(&Phase::PortScanning));
        assert!(phases.contains(&Phase::Authentication));
        assert_eq!(phases.last(), Some(&Phase::Completed));
    }

    #[tokio::test]
    async fn test_retry_recovers_rejected_device_in_place() {
        let fake = FakeOnvif::new("admin", "secret");
        let service = fake.spawn().await;
        let ws = ws_responder(service).await;

        let engine = DiscoveryEngine::new(config(9), Arc::new(FakeProber::new(|_| Reply::Ok)))
            .with_ws_target(ws);

        let mut request = DiscoveryRequest::new("127.0.0.1", vec![Credential::new("alice", "wrong")]);
        request.enable_port_scan = false;
        request.enable_nvr = false;
        let first = engine.discover(&request, None, CancellationToken::new()).await;

        assert_eq!(first.result.failed_devices, 1);
        assert_eq!(first.devices.len(), 1);
        let device = first.devices[0].clone();
        assert!(device.auth_failed());
        assert!(!device.has_stream());

        let mut again = DiscoveryRequest::new("", vec![Credential::new("admin", "secret")]);
        again.enable_nvr = false;
        let second = engine.retry(&first.devices, &again, None).await;

        assert_eq!(second.result.successful_devices, 1);
        assert!(Arc::ptr_eq(&second.devices[0], &device));
        assert!(!device.auth_failed());
        assert!(device.has_stream());
        assert!(device.error().is_none());
        assert_eq!(device.credential().unwrap().username, "admin");
        assert_eq!(second.result.devices[0].authentication_method, Some(AuthMethod::Digest));
    }

    #[tokio::test]
    async fn test_retry_skips_devices_with_streams() {
        let engine = DiscoveryEngine::new(config(9), Arc::new(FakeProber::new(|_| Reply::Ok)));
        let done = Arc::new(Device::new("10.0.0.9"));
        done.set_streams(
            crate::models::StreamDescriptor::new("rtsp://10.0.0.9:554/live"),
            None,
            DiscoveryMethod::RtspPattern,
        );

        let run = engine
            .retry(&[done], &DiscoveryRequest::new("", vec![Credential::new("a", "b")]), None)
            .await;
        assert_eq!(run.result.total_devices, 0);
        assert!(run.devices.is_empty());

        let run = engine.retry(&[], &DiscoveryRequest::new("", vec![]), None).await;
        assert_eq!(run.result.errors[0].error, "Configuration error");
    }

    #[tokio::test]
    async fn test_invalid_request_is_single_error() {
        let engine = DiscoveryEngine::new(config(9), Arc::new(FakeProber::new(|_| Reply::Ok)));
        let result = engine.run(&DiscoveryRequest::new("192.168.1.1", vec![]), None).await;

        assert_eq!(result.total_devices, 1);
        assert!(result.devices.is_empty());
        assert_eq!(result.errors[0].error, "Configuration error");
        assert!(result.errors[0].details.contains("At least one credential is required"));
    }

    #[tokio::test]
    async fn test_overall_timeout_returns_partial_result() {
        // Never answers
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let cfg = DiscoveryConfig {
            wsd_window: Duration::from_secs(30),
            ..config(9)
        };
        let engine = DiscoveryEngine::new(cfg, Arc::new(FakeProber::new(|_| Reply::Ok)))
            .with_ws_target(silent.local_addr().unwrap());

        let mut request = DiscoveryRequest::new("127.0.0.1", vec![Credential::new("a", "b")]);
        request.timeout_secs = Some(1);

        let started = Instant::now();
        let result = engine.run(&request, None).await;
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(result.total_devices, 0);
        assert!(result.errors.is_empty());
    }
}
