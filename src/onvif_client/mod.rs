//! ONVIF management-protocol client
//!
//! - `soap`: envelopes and WS-Security headers (digest / plaintext)
//! - `xml`: namespace-tolerant extraction
//! - `client`: authentication, identity, clock, name, stream URIs

mod client;
pub mod soap;
mod types;
pub mod xml;

pub use client::{
    candidate_addresses, channel_label, classify_response, expand_channels, inject_credentials,
    OnvifClient, AUTH_FAILED_MESSAGE, AUTH_SCHEMES, ONVIF_FALLBACK_PORTS,
};
pub use types::{pair_profiles, AuthOutcome, ChannelStreams, DeviceInformation, MediaProfile, ProfilePair, Session};
