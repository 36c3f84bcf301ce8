//! TCP connect port scanner

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::{self, DiscoveryConfig, HTTP_PORTS, RTSP_PORTS};
use crate::models::{Device, Phase, ProgressEvent, ProgressListener};

/// Port scan result
#[derive(Debug, Clone)]
pub struct PortScanResult {
    pub ip: IpAddr,
    pub port: u16,
    pub open: bool,
    pub latency_ms: Option<u64>,
}

/// Connect to a single port
pub async fn scan_port(ip: IpAddr, port: u16, connect_timeout: Duration) -> PortScanResult {
    let addr = SocketAddr::new(ip, port);
    let start = Instant::now();

    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => PortScanResult {
            ip,
            port,
            open: true,
            latency_ms: Some(start.elapsed().as_millis() as u64),
        },
        Ok(Err(_)) | Err(_) => PortScanResult {
            ip,
            port,
            open: false,
            latency_ms: None,
        },
    }
}

/// Connect to every port of one host (concurrently; no retries)
pub async fn scan_ports(ip: IpAddr, ports: &[u16], connect_timeout: Duration) -> Vec<PortScanResult> {
    futures::future::join_all(ports.iter().map(|&p| scan_port(ip, p, connect_timeout))).await
}

/// Build a device record from a host's open ports
///
/// RTSP-family ports go into the open-port set; the first open HTTP-family
/// port seeds an ONVIF device-service guess. `None` when nothing is open.
pub fn device_from_open_ports(ip: Ipv4Addr, open: &[u16]) -> Option<Device> {
    if open.is_empty() {
        return None;
    }
    let device = Device::new(ip.to_string());
    for port in open.iter().filter(|p| RTSP_PORTS.contains(p)) {
        device.add_open_port(*port);
    }
    if let Some(port) = HTTP_PORTS.iter().find(|p| open.contains(p)) {
        device.set_service_address(format!("http://{}:{}/onvif/device_service", ip, port));
    }
    Some(device)
}

/// Bounded-pool TCP scanner over an address list
pub struct PortScanner {
    ports: Arc<Vec<u16>>,
    connect_timeout: Duration,
    workers: usize,
}

impl PortScanner {
    pub fn new(ports: Vec<u16>, connect_timeout: Duration) -> Self {
        Self {
            ports: Arc::new(ports),
            connect_timeout,
            workers: config::pool_size(50),
        }
    }

    pub fn from_config(cfg: &DiscoveryConfig) -> Self {
        Self::new(cfg.scan_ports.clone(), cfg.connect_timeout)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Scan all hosts; returns one device per host with at least one open
    /// port, sorted by address. Stops early when `cancel` fires.
    pub async fn scan(
        &self,
        ips: &[Ipv4Addr],
        listener: Option<Arc<dyn ProgressListener>>,
        cancel: &CancellationToken,
    ) -> Vec<Device> {
        let total = ips.len();
        tracing::info!(hosts = total, ports = self.ports.len(), workers = self.workers, "Port scan started");

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut set = JoinSet::new();

        for &ip in ips {
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let ports = self.ports.clone();
            let connect_timeout = self.connect_timeout;
            set.spawn(async move {
                let _permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit.ok()?,
                    _ = cancel.cancelled() => return None,
                };
                if cancel.is_cancelled() {
                    return None;
                }
                let results = scan_ports(IpAddr::V4(ip), &ports, connect_timeout).await;
                for r in results.iter().filter(|r| r.open) {
                    tracing::trace!(ip = %r.ip, port = r.port, latency_ms = ?r.latency_ms, "Port open");
                }
                let open: Vec<u16> = results.iter().filter(|r| r.open).map(|r| r.port).collect();
                Some((ip, open))
            });
        }

        let mut found: Vec<(Ipv4Addr, Device)> = Vec::new();
        let mut done = 0usize;

        loop {
            let next = tokio::select! {
                next = set.join_next() => next,
                _ = cancel.cancelled() => {
                    tracing::warn!(scanned = done, total, "Port scan cancelled");
                    set.abort_all();
                    break;
                }
            };
            let Some(joined) = next else { break };
            done += 1;

            let Ok(Some((ip, open))) = joined else { continue };
            if !open.is_empty() {
                tracing::debug!(ip = %ip, ports = ?open, "Open ports");
            }
            if let Some(listener) = &listener {
                listener.on_progress(
                    &ProgressEvent::new(
                        Phase::PortScanning,
                        done,
                        total,
                        format!("Scanned {} ({} open)", ip, open.len()),
                    )
                    .with_device(&ip.to_string()),
                );
            }
            if let Some(device) = device_from_open_ports(ip, &open) {
                found.push((ip, device));
            }
        }

        found.sort_by_key(|(ip, _)| *ip);
        tracing::info!(hosts = total, responsive = found.len(), "Port scan finished");
        found.into_iter().map(|(_, d)| d).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_device_from_open_ports() {
        let ip = Ipv4Addr::new(192, 168, 1, 20);
        assert!(device_from_open_ports(ip, &[]).is_none());

        let d = device_from_open_ports(ip, &[8080, 554, 37777]).unwrap();
        assert_eq!(d.open_ports(), vec![554]);
        assert_eq!(
            d.service_address().as_deref(),
            Some("http://192.168.1.20:8080/onvif/device_service")
        );

        // Vendor-only port still yields a record, without service address
        let d = device_from_open_ports(ip, &[37777]).unwrap();
        assert!(d.open_ports().is_empty());
        assert!(d.service_address().is_none());
    }

    #[test]
    fn test_http_port_priority() {
        let d = device_from_open_ports(Ipv4Addr::new(10, 0, 0, 1), &[8000, 80]).unwrap();
        assert_eq!(
            d.service_address().as_deref(),
            Some("http://10.0.0.1:80/onvif/device_service")
        );
    }

    #[tokio::test]
    async fn test_scan_port_open_and_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        let open = scan_port(ip, port, Duration::from_millis(500)).await;
        assert!(open.open);
        assert!(open.latency_ms.is_some());

        drop(listener);
        let closed = scan_port(ip, port, Duration::from_millis(500)).await;
        assert!(!closed.open);
    }

    #[tokio::test]
    async fn test_scan_finds_loopback_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let scanner = PortScanner::new(vec![port], Duration::from_millis(500)).with_workers(2);
        let devices = scanner
            .scan(&[Ipv4Addr::LOCALHOST], None, &CancellationToken::new())
            .await;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].ip(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_scan_cancelled_returns_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let scanner = PortScanner::new(vec![9], Duration::from_millis(100));
        let devices = scanner.scan(&[Ipv4Addr::LOCALHOST], None, &cancel).await;
        assert!(devices.is_empty());
    }
}
