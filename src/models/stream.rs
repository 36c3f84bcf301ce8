//! Credential, stream descriptor and method tags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Username/password pair tried against a device
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse `user:pass` (password may contain ':'; missing password = empty)
    pub fn parse(s: &str) -> Option<Self> {
        let (user, pass) = match s.split_once(':') {
            Some((u, p)) => (u, p),
            None => (s, ""),
        };
        if user.trim().is_empty() {
            return None;
        }
        Some(Self::new(user.trim(), pass))
    }

    /// Empty usernames are skipped during rotation
    pub fn is_valid(&self) -> bool {
        !self.username.trim().is_empty()
    }
}

// Keep passwords out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// WS-Security encoding that produced a valid device-information response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Digest,
    Plaintext,
    None,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Digest => "digest",
            AuthMethod::Plaintext => "plaintext",
            AuthMethod::None => "none",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a device's stream addresses were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    Onvif,
    RtspPattern,
    NvrChannel,
}

/// A working (or attempted) stream address plus probe metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub url: String,
    pub resolution: String,
    pub codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            resolution: "Unknown".to_string(),
            codec: "Unknown".to_string(),
            bitrate_kbps: None,
            fps: None,
            error: None,
        }
    }
}
