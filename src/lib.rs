//! IP camera / NVR discovery library
//!
//! ## Architecture (9 Components)
//!
//! 1. IpcamScan - IP ranges, TCP port scan, WS-Discovery
//! 2. OnvifClient - SOAP device management with WS-Security
//! 3. CameraBrand - manufacturer detection (ONVIF, OUI, HTTP banner)
//! 4. RtspPatterns - built-in and file-based RTSP path templates, pattern cache
//! 5. StreamProbe - RTSP DESCRIBE / ffprobe stream checks
//! 6. RtspDiscovery - template race with first-success cancellation
//! 7. NvrDetector - recorder channel expansion
//! 8. DeviceProber - per-device credential rotation
//! 9. DiscoveryEngine - request validation, phases, result aggregation
//!
//! ## Design Principles
//!
//! - A device is identified by its IP; probers merge, never duplicate
//! - One live credential per device at a time
//! - An explicit credential rejection stops further attempts on that device

pub mod camera_brand;
pub mod config;
pub mod device_prober;
pub mod discovery_engine;
pub mod error;
pub mod ipcam_scan;
pub mod models;
pub mod nvr_detector;
pub mod onvif_client;
pub mod rtsp_discovery;
pub mod rtsp_patterns;
pub mod stream_probe;

#[cfg(test)]
mod test_support;

pub use config::DiscoveryConfig;
pub use discovery_engine::{DiscoveryEngine, DiscoveryRequest, DiscoveryResult, DiscoveryRun};
pub use error::{Error, Result};
