//! Dashboard configuration types.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the data-access layer.
///
/// Every field has a documented default so a `config.toml` only needs to
/// name what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Root URL of the remote biorhythm API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bearer token attached to every request.
    #[serde(default)]
    pub api_token: String,

    /// Username for the credential-exchange endpoint (token refresh).
    #[serde(default)]
    pub api_username: String,

    /// Password for the credential-exchange endpoint.
    #[serde(default)]
    pub api_password: String,

    /// Default TTL applied to new cache entries (seconds).
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Maximum attempt count for transient request failures.
    #[serde(default = "default_max_attempts")]
    pub max_retry_attempts: u32,

    /// First backoff delay in milliseconds; doubles each attempt.
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,

    /// Add up to 50% random jitter to computed backoff delays.
    #[serde(default = "default_true")]
    pub retry_jitter: bool,

    /// Per-call network timeout (milliseconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl DashboardConfig {
    /// True when a username/password pair is available for token refresh.
    pub fn has_refresh_credentials(&self) -> bool {
        !self.api_username.trim().is_empty() && !self.api_password.trim().is_empty()
    }
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_api_base_url() -> String {
    "http://localhost:8000/api".into()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff() -> u64 {
    250
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_token: String::new(),
            api_username: String::new(),
            api_password: String::new(),
            cache_ttl_secs: default_cache_ttl(),
            max_retry_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff(),
            retry_jitter: default_true(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}
