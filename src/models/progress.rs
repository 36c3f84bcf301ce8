//! Progress notifications

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discovery phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "ONVIF Discovery")]
    OnvifDiscovery,
    #[serde(rename = "Port Scanning")]
    PortScanning,
    #[serde(rename = "Authentication")]
    Authentication,
    #[serde(rename = "Completed")]
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::OnvifDiscovery => "ONVIF Discovery",
            Phase::PortScanning => "Port Scanning",
            Phase::Authentication => "Authentication",
            Phase::Completed => "Completed",
        };
        f.write_str(s)
    }
}

/// Read-only progress notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub current: usize,
    pub total: usize,
    pub message: String,
    /// Device the event refers to, when per-device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl ProgressEvent {
    pub fn new(phase: Phase, current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            phase,
            current,
            total,
            message: message.into(),
            device: None,
        }
    }

    pub fn with_device(mut self, ip: &str) -> Self {
        self.device = Some(ip.to_string());
        self
    }

    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current.min(self.total) * 100) / self.total) as u8
    }
}

/// External progress sink
///
/// Closures `Fn(&ProgressEvent)` implement this directly.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);

    fn on_complete(&self) {}

    fn on_cancelled(&self) {}
}

impl<F> ProgressListener for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_percentage() {
        assert_eq!(ProgressEvent::new(Phase::PortScanning, 5, 10, "").percentage(), 50);
        assert_eq!(ProgressEvent::new(Phase::PortScanning, 0, 0, "").percentage(), 0);
        assert_eq!(ProgressEvent::new(Phase::PortScanning, 12, 10, "").percentage(), 100);
    }

    #[test]
    fn test_closure_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = move |e: &ProgressEvent| sink.lock().push(e.message.clone());
        listener.on_progress(&ProgressEvent::new(Phase::Authentication, 1, 2, "hello"));
        listener.on_complete();
        assert_eq!(seen.lock().as_slice(), ["hello".to_string()]);
    }

    #[test]
    fn test_phase_display_matches_serde() {
        assert_eq!(Phase::OnvifDiscovery.to_string(), "ONVIF Discovery");
        assert_eq!(
            serde_json::to_string(&Phase::PortScanning).unwrap(),
            "\"Port Scanning\""
        );
    }
}
