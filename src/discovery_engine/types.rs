//! Discovery request and result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::ipcam_scan::parse_ip_range;
use crate::models::{AuthMethod, Credential, Device, DiscoveryMethod, StreamDescriptor};

/// One discovery run's input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryRequest {
    /// `a.b.c.d`, `start-end` or `a.b.c.d-e`
    pub ip_range: String,
    /// Tried in order against every device
    pub credentials: Vec<Credential>,
    pub enable_onvif: bool,
    pub enable_port_scan: bool,
    pub enable_rtsp_guess: bool,
    pub enable_nvr: bool,
    /// Device worker pool size (default derived from available parallelism)
    pub workers: Option<usize>,
    /// Overall budget; partial results are returned when it expires
    pub timeout_secs: Option<u64>,
    /// Keep rotating credentials after an explicit rejection
    pub continue_on_auth_failure: bool,
}

impl Default for DiscoveryRequest {
    fn default() -> Self {
        Self {
            ip_range: String::new(),
            credentials: Vec::new(),
            enable_onvif: true,
            enable_port_scan: true,
            enable_rtsp_guess: true,
            enable_nvr: true,
            workers: None,
            timeout_secs: None,
            continue_on_auth_failure: false,
        }
    }
}

impl DiscoveryRequest {
    pub fn new(ip_range: impl Into<String>, credentials: Vec<Credential>) -> Self {
        Self {
            ip_range: ip_range.into(),
            credentials,
            ..Self::default()
        }
    }

    /// Check the request and expand its address range
    pub fn validate(&self) -> Result<Vec<Ipv4Addr>> {
        if self.ip_range.trim().is_empty() {
            return Err(Error::Config("IP range is required".to_string()));
        }
        if self.credentials.is_empty() {
            return Err(Error::Config("At least one credential is required".to_string()));
        }
        if self.workers == Some(0) {
            return Err(Error::Config("Worker pool size must be at least 1".to_string()));
        }
        parse_ip_range(&self.ip_range)
    }
}

/// A device that produced streams (or a recorder parent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceResult {
    pub ip: String,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub name: Option<String>,
    pub serial: Option<String>,
    pub firmware: Option<String>,
    pub mac: Option<String>,
    pub clock_offset_ms: Option<i64>,
    pub credentials: Option<Credential>,
    pub main_stream: Option<StreamDescriptor>,
    pub sub_stream: Option<StreamDescriptor>,
    pub discovery_method: Option<DiscoveryMethod>,
    pub authentication_method: Option<AuthMethod>,
    pub is_recorder: bool,
    pub channel_count: u32,
    pub parent_ip: Option<String>,
}

impl From<&Device> for DeviceResult {
    fn from(device: &Device) -> Self {
        let s = device.snapshot();
        Self {
            ip: device.ip().to_string(),
            vendor: s.vendor,
            model: s.model,
            name: s.name,
            serial: s.serial,
            firmware: s.firmware,
            mac: s.mac,
            clock_offset_ms: s.clock_offset_ms,
            credentials: s.credential,
            main_stream: s.main_stream,
            sub_stream: s.sub_stream,
            discovery_method: s.discovery_method,
            authentication_method: s.auth_method,
            is_recorder: s.is_recorder,
            channel_count: s.channel_count,
            parent_ip: s.parent_ip,
        }
    }
}

/// A device that yielded nothing usable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceError {
    /// Empty for run-level errors
    pub ip: String,
    pub error: String,
    pub details: String,
}

impl DeviceError {
    pub fn from_device(device: &Device) -> Self {
        let s = device.snapshot();
        let onvif = if s.service_address.is_some() {
            "ONVIF available".to_string()
        } else {
            "ONVIF not found".to_string()
        };
        let ports = if s.open_ports.is_empty() {
            "No RTSP ports open".to_string()
        } else {
            format!("Ports open: {:?}", s.open_ports.iter().collect::<Vec<_>>())
        };
        let auth = if s.auth_failed {
            "Authentication failed"
        } else {
            "Authentication not attempted or no credentials"
        };
        Self {
            ip: device.ip().to_string(),
            error: s.error.unwrap_or_else(|| "No streams found".to_string()),
            details: format!("Discovery attempts: {}, {}, {}", onvif, ports, auth),
        }
    }
}

/// One run's output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub discovery_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_devices: usize,
    pub successful_devices: usize,
    pub failed_devices: usize,
    pub devices: Vec<DeviceResult>,
    pub errors: Vec<DeviceError>,
}

impl DiscoveryResult {
    /// Split probed devices into results and errors, preserving order.
    ///
    /// A device with a stream or a recorder flag is a result.
    pub fn from_devices(devices: &[impl AsRef<Device>], discovery_time: DateTime<Utc>, duration_ms: u64) -> Self {
        let mut results = Vec::new();
        let mut errors = Vec::new();
        for device in devices.iter().map(AsRef::as_ref) {
            if device.has_stream() || device.is_recorder() {
                results.push(DeviceResult::from(device));
            } else {
                errors.push(DeviceError::from_device(device));
            }
        }
        Self::assemble(discovery_time, duration_ms, results, errors)
    }

    /// A run that failed before probing (bad request, setup failure)
    pub fn failed(discovery_time: DateTime<Utc>, duration_ms: u64, error: &str, details: impl Into<String>) -> Self {
        let errors = vec![DeviceError {
            ip: String::new(),
            error: error.to_string(),
            details: details.into(),
        }];
        Self::assemble(discovery_time, duration_ms, Vec::new(), errors)
    }

    fn assemble(
        discovery_time: DateTime<Utc>,
        duration_ms: u64,
        devices: Vec<DeviceResult>,
        errors: Vec<DeviceError>,
    ) -> Self {
        Self {
            discovery_time,
            duration_ms,
            total_devices: devices.len() + errors.len(),
            successful_devices: devices.len(),
            failed_devices: errors.len(),
            devices,
            errors,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
