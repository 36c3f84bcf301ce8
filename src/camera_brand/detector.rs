//! Manufacturer detection
//!
//! Order: vendor reported by ONVIF, then OUI of the MAC (looked up through the
//! ARP cache when unknown), then HTTP banner headers. Every failure falls
//! through to the next method; the caller only ever sees a vendor name.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{SERVER, WWW_AUTHENTICATE};

use super::arp;
use super::oui_data::OuiTable;
use super::vendor::{normalize_vendor, GENERIC};
use crate::models::Device;

/// Ports checked for HTTP banners (443 over https)
pub const BANNER_PORTS: &[u16] = &[80, 8080, 443, 8000];

/// Embedded web server names that identify a vendor without naming it
const SERVER_MARKERS: &[(&str, &str)] = &[
    ("app-webs", "Hikvision"),
    ("dnvrs-webs", "Hikvision"),
    ("hikvision-webs", "Hikvision"),
    ("dhwebs", "Dahua"),
    ("ipcamera-webs", "Hikvision"),
];

/// Vendor from `Server` / `WWW-Authenticate` header values
pub fn vendor_from_banner(server: Option<&str>, www_authenticate: Option<&str>) -> Option<&'static str> {
    [server, www_authenticate]
        .into_iter()
        .flatten()
        .find_map(|value| {
            let lower = value.to_lowercase();
            SERVER_MARKERS
                .iter()
                .find(|(marker, _)| lower.contains(marker))
                .map(|(_, vendor)| *vendor)
                .or_else(|| normalize_vendor(value))
        })
}

#[derive(Debug, Clone)]
pub struct ManufacturerDetector {
    oui: Arc<OuiTable>,
    http: reqwest::Client,
    banner_ports: Vec<u16>,
    arp_timeout: Duration,
    use_arp: bool,
}

impl ManufacturerDetector {
    pub fn new(oui: Arc<OuiTable>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();
        Self {
            oui,
            http,
            banner_ports: BANNER_PORTS.to_vec(),
            arp_timeout: Duration::from_secs(2),
            use_arp: true,
        }
    }

    pub fn with_banner_ports(mut self, ports: Vec<u16>) -> Self {
        self.banner_ports = ports;
        self
    }

    /// Disable the system ARP query (MACs already on the record still count)
    pub fn without_arp(mut self) -> Self {
        self.use_arp = false;
        self
    }

    /// Canonical vendor for `device`, or "Generic"
    ///
    /// A MAC found in the ARP cache is stored on the device so later stages
    /// can build the pattern cache key.
    pub async fn detect(&self, device: &Device) -> String {
        let reported = device.vendor().filter(|v| !v.trim().is_empty());
        if let Some(vendor) = reported.as_deref().and_then(normalize_vendor) {
            return vendor.to_string();
        }

        if let Some(vendor) = self.detect_by_mac(device).await {
            tracing::debug!(ip = %device.ip(), vendor = %vendor, "vendor from OUI");
            return vendor;
        }

        if let Some(vendor) = self.detect_by_banner(&device.host()).await {
            tracing::debug!(ip = %device.ip(), vendor = %vendor, "vendor from HTTP banner");
            return vendor.to_string();
        }

        // An unrecognised ONVIF manufacturer string beats the fallback
        reported
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| GENERIC.to_string())
    }

    /// True when the device's MAC maps to `vendor` in the OUI table
    pub fn mac_confirms(&self, device: &Device, vendor: &str) -> bool {
        device
            .mac()
            .map_or(false, |mac| self.oui.lookup(&mac) == Some(vendor))
    }

    async fn detect_by_mac(&self, device: &Device) -> Option<String> {
        let mac = match device.mac() {
            Some(mac) => mac,
            None if self.use_arp => {
                let ip: Ipv4Addr = device.host().parse().ok()?;
                let mac = arp::lookup_mac(ip, self.arp_timeout).await?;
                device.update(|s| s.mac = Some(mac.clone()));
                mac
            }
            None => return None,
        };
        self.oui.lookup(&mac).map(str::to_string)
    }

    async fn detect_by_banner(&self, host: &str) -> Option<&'static str> {
        for &port in &self.banner_ports {
            let scheme = if port == 443 { "https" } else { "http" };
            let url = format!("{}://{}:{}/", scheme, host, port);
            let resp = match self.http.head(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::trace!(url = %url, error = %e, "banner probe failed");
                    continue;
                }
            };
            let headers = resp.headers();
            let server = headers.get(SERVER).and_then(|v| v.to_str().ok());
            let auth = headers.get(WWW_AUTHENTICATE).and_then(|v| v.to_str().ok());
            if let Some(vendor) = vendor_from_banner(server, auth) {
                return Some(vendor);
            }
        }
        None
    }
}

impl Default for ManufacturerDetector {
    fn default() -> Self {
        Self::new(Arc::new(OuiTable::builtin()))
    }
}
