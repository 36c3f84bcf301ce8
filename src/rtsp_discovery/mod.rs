//! RTSP Stream-Address Discovery
//!
//! Guesses stream paths for a device that has credentials and open RTSP
//! ports:
//!
//! 1. the cached template for the device's cache key, port by port
//! 2. a race over every (template, port) pair for the detected vendor
//! 3. the same race over the Generic list
//!
//! The first success wins and aborts the rest of the race. An explicit auth
//! rejection from any probe flags the device and stops everything, so a
//! wrong password is never replayed against every template.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::camera_brand::GENERIC;
use crate::config::DiscoveryConfig;
use crate::models::{Credential, Device, DiscoveryMethod, StreamDescriptor};
use crate::rtsp_patterns::{cache_key, PatternCache, PatternEntry, PatternManager};
use crate::stream_probe::{build_rtsp_url, ProbeOutcome, StreamProber, AUTH_INVALID};

pub const DISCOVERY_FAILED: &str = "RTSP URL discovery failed";

/// How a discovery pass ended
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    /// Streams were set on the device using this template
    Found(PatternEntry),
    /// A probe was explicitly rejected; the device is flagged auth-failed
    AuthRejected,
    /// Every template was tried without success
    NotFound,
    /// Preconditions not met ("no credentials", "no open ports", "cancelled")
    Skipped(&'static str),
}

/// Result of one (template, port) attempt
#[derive(Debug)]
enum Attempt {
    Hit {
        pattern: PatternEntry,
        main: StreamDescriptor,
        sub: Option<StreamDescriptor>,
    },
    AuthRejected(String),
    Miss,
}

#[derive(Clone)]
struct AttemptContext {
    prober: Arc<dyn StreamProber>,
    host: String,
    credential: Credential,
    timeout: Duration,
}

impl AttemptContext {
    async fn probe(&self, path: &str, port: u16) -> (String, Option<ProbeOutcome>) {
        let url = build_rtsp_url(&self.host, port, path, Some(&self.credential));
        // Outer deadline in case a prober overruns its own timeout
        let outcome = tokio::time::timeout(
            self.timeout + Duration::from_millis(250),
            self.prober.probe(&url, self.timeout),
        )
        .await
        .ok();
        (url, outcome)
    }

    /// Main path on `port`; on success also the sub path on the same port
    async fn try_pattern(&self, pattern: PatternEntry, port: u16) -> Attempt {
        let (main_url, outcome) = self.probe(&pattern.main, port).await;
        let Some(outcome) = outcome else {
            tracing::debug!(url = %main_url, "probe deadline exceeded");
            return Attempt::Miss;
        };

        if outcome.auth_failed {
            return Attempt::AuthRejected(outcome.error.unwrap_or_else(|| AUTH_INVALID.to_string()));
        }
        if !outcome.success {
            tracing::trace!(url = %main_url, error = ?outcome.error, "candidate failed");
            return Attempt::Miss;
        }

        let main = outcome.to_descriptor(&main_url);
        let sub = match pattern.sub.as_deref() {
            Some(path) => match self.probe(path, port).await {
                (url, Some(o)) if o.success => Some(o.to_descriptor(&url)),
                _ => None,
            },
            None => None,
        };
        Attempt::Hit { pattern, main, sub }
    }
}

/// Template search over a device's open RTSP ports
pub struct RtspDiscoveryEngine {
    patterns: Arc<PatternManager>,
    cache: Arc<PatternCache>,
    prober: Arc<dyn StreamProber>,
    probe_timeout: Duration,
    concurrency: usize,
}

impl RtspDiscoveryEngine {
    pub fn new(
        patterns: Arc<PatternManager>,
        cache: Arc<PatternCache>,
        prober: Arc<dyn StreamProber>,
        config: &DiscoveryConfig,
    ) -> Self {
        Self {
            patterns,
            cache,
            prober,
            probe_timeout: config.stream_probe_timeout,
            concurrency: config.race_concurrency.max(1),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Find main/sub stream URLs for `device` using its current credential.
    ///
    /// `mac_confirmed` means `vendor` came from the OUI table, which widens
    /// the template list to built-in plus file entries.
    pub async fn discover(
        &self,
        device: &Device,
        vendor: &str,
        mac_confirmed: bool,
        cancel: &CancellationToken,
    ) -> DiscoveryOutcome {
        let Some(credential) = device.credential() else {
            tracing::debug!(ip = %device.ip(), "Skipping RTSP discovery - no credentials");
            return DiscoveryOutcome::Skipped("no credentials");
        };
        let ports = device.open_ports();
        if ports.is_empty() {
            tracing::debug!(ip = %device.ip(), "Skipping RTSP discovery - no open ports");
            return DiscoveryOutcome::Skipped("no open ports");
        }

        let ctx = AttemptContext {
            prober: self.prober.clone(),
            host: device.host(),
            credential,
            timeout: self.probe_timeout,
        };
        let key = cache_key(vendor, device);
        tracing::info!(ip = %device.ip(), vendor = %vendor, ports = ?ports, "RTSP discovery");

        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!(ip = %device.ip(), key = %key, main = %cached.main, "Trying cached pattern");
            for &port in &ports {
                match ctx.try_pattern(cached.clone(), port).await {
                    Attempt::Hit { pattern, main, sub } => {
                        tracing::info!(ip = %device.ip(), url = %main.url, "Cached pattern worked");
                        device.set_streams(main, sub, DiscoveryMethod::RtspPattern);
                        return DiscoveryOutcome::Found(pattern);
                    }
                    Attempt::AuthRejected(msg) => return self.reject(device, &msg),
                    Attempt::Miss => {}
                }
            }
        }

        let mut lists = vec![self.patterns.patterns_for(vendor, mac_confirmed)];
        let generic = self.patterns.generic();
        // Unknown vendors already got the Generic list
        if vendor != GENERIC && lists[0] != generic {
            lists.push(generic);
        }

        for (round, list) in lists.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return DiscoveryOutcome::Skipped("cancelled");
            }
            if round > 0 {
                tracing::debug!(ip = %device.ip(), "Trying generic patterns as fallback");
            }
            match self.race(&ctx, list, &ports, cancel).await {
                Attempt::Hit { pattern, main, sub } => {
                    tracing::info!(ip = %device.ip(), url = %main.url, "Found working RTSP URL");
                    device.set_streams(main, sub, DiscoveryMethod::RtspPattern);
                    self.cache.put(key, pattern.clone()).await;
                    return DiscoveryOutcome::Found(pattern);
                }
                Attempt::AuthRejected(msg) => return self.reject(device, &msg),
                Attempt::Miss => {}
            }
        }

        tracing::info!(ip = %device.ip(), "No working RTSP URLs found");
        device.set_error(DISCOVERY_FAILED);
        DiscoveryOutcome::NotFound
    }

    fn reject(&self, device: &Device, msg: &str) -> DiscoveryOutcome {
        tracing::warn!(ip = %device.ip(), error = %msg, "RTSP credentials rejected, aborting discovery");
        device.mark_auth_failed(msg);
        DiscoveryOutcome::AuthRejected
    }

    /// Probe every (template, port) pair with bounded concurrency; first
    /// decisive answer aborts the rest.
    async fn race(
        &self,
        ctx: &AttemptContext,
        patterns: Vec<PatternEntry>,
        ports: &[u16],
        cancel: &CancellationToken,
    ) -> Attempt {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for pattern in patterns {
            for &port in ports {
                let semaphore = semaphore.clone();
                let ctx = ctx.clone();
                let pattern = pattern.clone();
                set.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    Some(ctx.try_pattern(pattern, port).await)
                });
            }
        }

        loop {
            let joined = tokio::select! {
                joined = set.join_next() => joined,
                _ = cancel.cancelled() => {
                    set.abort_all();
                    return Attempt::Miss;
                }
            };
            match joined {
                Some(Ok(Some(attempt @ (Attempt::Hit { .. } | Attempt::AuthRejected(_))))) => {
                    set.abort_all();
                    return attempt;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => tracing::debug!(error = %e, "probe task failed"),
                None => return Attempt::Miss,
            }
        }
    }
}
