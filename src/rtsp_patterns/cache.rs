//! Learned-pattern cache
//!
//! Remembers which template worked for a (vendor, model, /24 prefix, OUI)
//! combination so the next matching device tries it first. Last writer wins,
//! no eviction.

use std::collections::HashMap;
use tokio::sync::RwLock;

use super::PatternEntry;
use crate::models::Device;

/// `vendor:model:ipPrefix:macPrefix`
pub fn cache_key(vendor: &str, device: &Device) -> String {
    let state = device.snapshot();
    let host = device.host();
    let ip_prefix = host.rsplit_once('.').map_or(host.as_str(), |(prefix, _)| prefix);
    let mac_prefix = state
        .mac
        .as_deref()
        .and_then(|m| m.get(0..8))
        .map(str::to_uppercase)
        .unwrap_or_default();
    format!(
        "{}:{}:{}:{}",
        vendor,
        state.model.as_deref().unwrap_or_default(),
        ip_prefix,
        mac_prefix
    )
}

#[derive(Debug, Default)]
pub struct PatternCache {
    entries: RwLock<HashMap<String, PatternEntry>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<PatternEntry> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn put(&self, key: impl Into<String>, pattern: PatternEntry) {
        let key = key.into();
        tracing::info!(key = %key, main = %pattern.main, "cached successful pattern");
        self.entries.write().await.insert(key, pattern);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
