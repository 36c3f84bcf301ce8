//! IpcamScan - network probers
//!
//! ## Responsibilities
//!
//! - IP range parsing (`a.b.c.d`, `start-end`, `a.b.c.d-e`)
//! - TCP connect scan over camera-relevant ports
//! - WS-Discovery multicast probe for ONVIF devices
//!
//! Both probers produce bare `Device` records; merging is left to the caller.

mod ip_range;
mod port_scanner;
mod ws_discovery;

pub use ip_range::{generate_range, is_valid_ip, parse_ip_range, MAX_RANGE_SIZE};
pub use port_scanner::{device_from_open_ports, scan_port, scan_ports, PortScanResult, PortScanner};
pub use ws_discovery::{parse_xaddrs, probe_message, ws_discover, xaddr_host, WSD_MULTICAST, WSD_PORT};
