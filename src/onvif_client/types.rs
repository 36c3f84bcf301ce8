//! ONVIF response types

use serde::{Deserialize, Serialize};

use super::xml::extract_xml_value;
use crate::models::{AuthMethod, Credential};

/// ONVIF device information retrieved via GetDeviceInformation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInformation {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub serial_number: Option<String>,
    pub hardware_id: Option<String>,
}

impl DeviceInformation {
    /// `None` unless the body is a recognisable GetDeviceInformation response
    pub fn from_xml(xml: &str) -> Option<Self> {
        let info = Self {
            manufacturer: extract_xml_value(xml, "Manufacturer"),
            model: extract_xml_value(xml, "Model"),
            firmware_version: extract_xml_value(xml, "FirmwareVersion"),
            serial_number: extract_xml_value(xml, "SerialNumber"),
            hardware_id: extract_xml_value(xml, "HardwareId"),
        };
        if info.manufacturer.is_none()
            && info.model.is_none()
            && !xml.contains("GetDeviceInformationResponse")
        {
            return None;
        }
        Some(info)
    }
}

/// Media profile (token + display name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaProfile {
    pub token: String,
    pub name: Option<String>,
}

/// Consecutive profiles treated as one channel's main/sub streams
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePair {
    pub main: MediaProfile,
    pub sub: Option<MediaProfile>,
}

/// Pair profiles two at a time; an odd trailing profile has no sub stream
pub fn pair_profiles(profiles: Vec<MediaProfile>) -> Vec<ProfilePair> {
    let mut pairs = Vec::with_capacity(profiles.len().div_ceil(2));
    let mut iter = profiles.into_iter();
    while let Some(main) = iter.next() {
        pairs.push(ProfilePair {
            main,
            sub: iter.next(),
        });
    }
    pairs
}

/// Stream URIs resolved for one profile pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStreams {
    /// 1-based pair index
    pub index: u32,
    /// `Ch<n>` derived from the profile name, when recognisable
    pub label: Option<String>,
    pub main_url: String,
    pub sub_url: Option<String>,
}

/// Address + scheme + credential that authenticated against a device
#[derive(Debug, Clone)]
pub struct Session {
    pub address: String,
    pub scheme: AuthMethod,
    pub credential: Option<Credential>,
}

/// Result of a successful authentication pass
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub session: Session,
    pub info: DeviceInformation,
}
