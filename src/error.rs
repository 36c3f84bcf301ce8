//! Error handling for camera discovery

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connect refused / host unreachable
    #[error("Network unreachable: {0}")]
    Unreachable(String),

    /// Connect or read deadline exceeded
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Explicit 401/403-class rejection of the supplied credentials
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// Unparsable or structurally invalid SOAP/XML/RTSP response
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Search space exhausted without a working address
    #[error("No address found: {0}")]
    NoAddressFound(String),

    /// Invalid discovery request (fatal to the whole run)
    #[error("Config error: {0}")]
    Config(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the remote side actively rejected the credentials.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Error::AuthRejected(_))
    }

    /// Map a reqwest failure onto the discovery taxonomy.
    pub fn from_request(e: reqwest::Error, target: &str) -> Self {
        if e.is_timeout() {
            Error::Timeout(target.to_string())
        } else if e.is_connect() {
            Error::Unreachable(target.to_string())
        } else {
            Error::Http(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_rejection_classification() {
        assert!(Error::AuthRejected("401".into()).is_auth_rejection());
        assert!(!Error::Timeout("x".into()).is_auth_rejection());
        assert!(!Error::Malformed("x".into()).is_auth_rejection());
    }

    #[test]
    fn test_display_messages() {
        let e = Error::Config("IP range is required".into());
        assert_eq!(e.to_string(), "Config error: IP range is required");
    }
}
