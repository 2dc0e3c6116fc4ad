//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Body buffering limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Misdirection rules, tried in order.
    pub misdirect: Vec<MisdirectConfig>,

    /// Request mangling rules.
    pub request: RequestRules,

    /// Response mangling rules.
    pub response: ResponseRules,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// How long shutdown waits for in-flight connections, in seconds.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            drain_secs: 5,
        }
    }
}

/// Body buffering limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest request or captured response body held in memory.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// A `[[misdirect]]` rule.
///
/// `hosts` and `paths` restrict where the rule applies; the remaining fields
/// name the URL components it replaces.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct MisdirectConfig {
    /// Rule identifier for logging.
    pub name: String,

    /// Only misdirect these hostnames (case-insensitive). Empty = any host.
    pub hosts: Vec<String>,

    /// Only misdirect these exact paths. Empty = any path.
    pub paths: Vec<String>,

    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,

    /// Replacement query string; an empty string removes the query.
    pub query: Option<String>,
}

impl MisdirectConfig {
    /// Whether the rule replaces anything at all.
    pub fn rewrites_anything(&self) -> bool {
        self.scheme.is_some()
            || self.host.is_some()
            || self.port.is_some()
            || self.path.is_some()
            || self.query.is_some()
    }
}

/// `[request]` mangling rules, applied in the order listed here.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RequestRules {
    /// Headers to remove.
    pub remove_headers: Vec<String>,

    /// Headers to set, replacing existing values.
    pub set_headers: BTreeMap<String, String>,

    /// Body substitutions.
    pub replace: Vec<ReplaceConfig>,
}

impl RequestRules {
    pub fn is_empty(&self) -> bool {
        self.remove_headers.is_empty() && self.set_headers.is_empty() && self.replace.is_empty()
    }
}

/// `[response]` mangling rules, applied in the order listed here.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResponseRules {
    /// Override the status code.
    pub status: Option<u16>,

    /// Headers to remove.
    pub remove_headers: Vec<String>,

    /// Headers to set, replacing existing values.
    pub set_headers: BTreeMap<String, String>,

    /// Body substitutions.
    pub replace: Vec<ReplaceConfig>,
}

impl ResponseRules {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.remove_headers.is_empty()
            && self.set_headers.is_empty()
            && self.replace.is_empty()
    }
}

/// A body substitution.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ReplaceConfig {
    /// Text to look for.
    pub find: String,

    /// Replacement text.
    pub replace: String,

    /// Only apply when the URL path contains this fragment.
    #[serde(default)]
    pub path_contains: Option<String>,
}
