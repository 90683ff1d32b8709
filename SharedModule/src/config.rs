//! # Bridge Configuration
//!
//! Runtime settings for both ends of the bridge. Every field has a default so
//! a partial JSON document is enough to override a single setting.

use serde::{Deserialize, Serialize};

use crate::animation::Ease;
use crate::constants::queue::DEFAULT_FLUSH_INTERVAL_MS;

/// Caller-side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Pump tick used for deferred flushes once the host has started
    pub flush_interval_ms: u64,

    /// Treat the host as started from the beginning (no boot handshake)
    pub start_immediate: bool,

    /// Trace every batch sent and received
    pub log_wire: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            start_immediate: false,
            log_wire: false,
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Host-side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Warn when an operation targets an unknown object ID
    pub report_unknown_objects: bool,

    /// Send `StartedUnity` as soon as a transport is attached
    pub send_started_on_attach: bool,

    /// Ease used by animations that do not name one
    pub default_animation_ease: Ease,

    /// Trace every batch sent and received
    pub log_wire: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            report_unknown_objects: true,
            send_started_on_attach: true,
            default_animation_ease: Ease::Linear,
            log_wire: false,
        }
    }
}

impl HostConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_defaults() {
        let config = BridgeConfig::from_json_str(r#"{"start_immediate": true}"#).unwrap();
        assert!(config.start_immediate);
        assert_eq!(config.flush_interval_ms, DEFAULT_FLUSH_INTERVAL_MS);

        let host = HostConfig::from_json_str(r#"{"default_animation_ease": "easeInQuad"}"#).unwrap();
        assert_eq!(host.default_animation_ease, Ease::EaseInQuad);
        assert!(host.send_started_on_attach);
    }
}
