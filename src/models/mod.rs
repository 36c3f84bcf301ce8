//! Shared models for the discovery pipeline
//!
//! Types shared by the probers, the ONVIF client, the RTSP discovery engine
//! and the orchestrator.

mod device;
mod progress;
mod stream;

pub use device::{Device, DeviceSet, DeviceState};
pub use progress::{Phase, ProgressEvent, ProgressListener};
pub use stream::{AuthMethod, Credential, DiscoveryMethod, StreamDescriptor};
