//! Camera Brand Detection
//!
//! Canonical vendor names, the OUI table, ARP-cache MAC lookup and the
//! manufacturer detector built on top of them.

pub mod arp;
mod detector;
mod oui_data;
mod vendor;

pub use detector::{vendor_from_banner, ManufacturerDetector, BANNER_PORTS};
pub use oui_data::{extract_oui_prefix, is_locally_administered, OuiTable};
pub use vendor::{canonical_or_raw, canonical_vendors, normalize_vendor, GENERIC};
