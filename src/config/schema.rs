//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML
//! settings file; every field has a default so a minimal file works.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Forwarding retry configuration.
    pub retries: RetryConfig,

    /// Load balancer configuration.
    pub balancer: BalancerConfig,

    /// Quota broker configuration.
    pub broker: BrokerConfig,

    /// Where the service and backend maps are loaded from.
    pub discovery: DiscoveryConfig,

    /// Admin side-channel settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 2,
            request_secs: 30,
        }
    }
}

/// Forwarding retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of forwarding attempts per request.
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds.
    pub pause_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            pause_ms: 50,
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// How often the backend pools are refreshed, in seconds.
    pub fetch_interval_secs: u64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: 1,
        }
    }
}

/// Quota broker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BrokerConfig {
    /// Allow every request without consulting the authorizer.
    /// Debug use only.
    pub permissive: bool,

    /// Default provider key for the authorizer.
    pub provider_key: String,

    /// Alternative provider keys, selected by the `$provider` label.
    pub provider_key_alternatives: HashMap<String, String>,

    /// Authorize endpoint URL.
    pub authorize_url: String,

    /// Usage report endpoint URL.
    pub report_url: String,
}

/// Location of the externally-maintained service and backend maps.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// JSON map of service name → { path }.
    pub services_file: String,

    /// JSON map of service name → [endpoint URLs].
    pub backends_file: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            services_file: "/etc/quota-proxy/services.json".to_string(),
            backends_file: "/etc/quota-proxy/backends.json".to_string(),
        }
    }
}

/// Admin side-channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Path prefix of the admin endpoints (mounted at `/<path>/...`).
    pub path: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            path: "admin".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One named service: its public path prefix.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceConf {
    /// Public path prefix, e.g. "/service1".
    pub path: String,
}
