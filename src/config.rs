//! Runtime configuration
//!
//! Defaults come from environment variables (a `.env` file is honoured by the
//! binary via dotenvy) with hard-coded fallbacks.

use std::path::PathBuf;
use std::time::Duration;

/// Ports probed by the TCP scanner
pub const SCAN_PORTS: &[u16] = &[
    554, 8554, 80, 8080, 8000, 443, 8443, 5000, 5001, 37777, 37778, 7447, 9000, 9001,
];

/// RTSP-family ports (recorded as stream candidates)
pub const RTSP_PORTS: &[u16] = &[554, 8554];

/// HTTP-family ports that seed an ONVIF service address guess, in priority order
pub const HTTP_PORTS: &[u16] = &[80, 8080, 8000];

/// Discovery tuning knobs
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// External `# Vendor` / `main,sub` pattern file
    pub pattern_file: PathBuf,
    /// TCP connect timeout for the port scan
    pub connect_timeout: Duration,
    /// SOAP / vendor HTTP API timeout
    pub http_timeout: Duration,
    /// Per-attempt stream probe timeout
    pub stream_probe_timeout: Duration,
    /// WS-Discovery listen window
    pub wsd_window: Duration,
    /// Ceiling for one device's whole credential rotation
    pub device_timeout: Duration,
    /// Concurrent stream probes per template race
    pub race_concurrency: usize,
    /// Stop rotating credentials on the first explicit rejection
    pub abort_on_auth_failure: bool,
    pub scan_ports: Vec<u16>,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            pattern_file: std::env::var("IPCAM_PATTERN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("rtsp-urls.txt")),
            connect_timeout: Duration::from_millis(env_u64("IPCAM_CONNECT_TIMEOUT_MS", 500)),
            http_timeout: Duration::from_millis(env_u64("IPCAM_HTTP_TIMEOUT_MS", 5000)),
            stream_probe_timeout: Duration::from_millis(env_u64(
                "IPCAM_STREAM_PROBE_TIMEOUT_MS",
                1500,
            )),
            wsd_window: Duration::from_millis(env_u64("IPCAM_WSD_WINDOW_MS", 3000)),
            device_timeout: Duration::from_secs(env_u64("IPCAM_DEVICE_TIMEOUT_SECS", 600)),
            race_concurrency: 6,
            abort_on_auth_failure: std::env::var("IPCAM_ABORT_ON_AUTH_FAILURE")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
            scan_ports: SCAN_PORTS.to_vec(),
        }
    }
}

/// Available parallelism, falling back to 4
pub fn parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Worker pool size: `max(4, min(parallelism * 2, cap))`
pub fn pool_size(cap: usize) -> usize {
    (parallelism() * 2).min(cap).max(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_bounds() {
        assert!(pool_size(50) >= 4);
        assert!(pool_size(50) <= 50);
        assert_eq!(pool_size(2), 4);
    }

    #[test]
    fn test_rtsp_and_http_ports_are_scanned() {
        for p in RTSP_PORTS.iter().chain(HTTP_PORTS) {
            assert!(SCAN_PORTS.contains(p));
        }
    }
}
