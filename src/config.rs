//! Configuration loader — merges env vars, .env file, and config.toml.

use common::config::DashboardConfig;
use common::Error;
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_positive_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    let parsed = parse_positive_u64(raw, env_name)?;
    u32::try_from(parsed).map_err(|_| Error::Config(format!("{env_name} is too large")))
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn validate_config(config: &DashboardConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.api_base_url.trim().is_empty() {
        issues.push("api_base_url must not be empty".into());
    }
    if config.cache_ttl_secs == 0 {
        issues.push("cache_ttl_secs must be > 0".into());
    }
    if config.max_retry_attempts == 0 {
        issues.push("max_retry_attempts must be > 0".into());
    }
    if config.base_backoff_ms == 0 {
        issues.push("base_backoff_ms must be > 0".into());
    }
    if config.request_timeout_ms == 0 {
        issues.push("request_timeout_ms must be > 0".into());
    }
    if config.api_token.trim().is_empty() && !config.has_refresh_credentials() {
        issues.push(
            "either api_token or api_username/api_password is required (set in .env or environment)"
                .into(),
        );
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load dashboard configuration from environment and optional config file.
pub fn load_config() -> Result<DashboardConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = DashboardConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(url) = std::env::var("BIODASH_API_BASE_URL") {
        config.api_base_url = url;
    }
    if let Ok(token) = std::env::var("BIODASH_API_TOKEN") {
        config.api_token = token;
    }
    if let Ok(user) = std::env::var("BIODASH_API_USERNAME") {
        config.api_username = user;
    }
    if let Ok(pass) = std::env::var("BIODASH_API_PASSWORD") {
        config.api_password = pass;
    }
    if let Ok(raw) = std::env::var("BIODASH_CACHE_TTL_SECS") {
        config.cache_ttl_secs = parse_positive_u64(&raw, "BIODASH_CACHE_TTL_SECS")?;
    }
    if let Ok(raw) = std::env::var("BIODASH_MAX_RETRY_ATTEMPTS") {
        config.max_retry_attempts = parse_positive_u32(&raw, "BIODASH_MAX_RETRY_ATTEMPTS")?;
    }
    if let Ok(raw) = std::env::var("BIODASH_BASE_BACKOFF_MS") {
        config.base_backoff_ms = parse_positive_u64(&raw, "BIODASH_BASE_BACKOFF_MS")?;
    }
    if let Ok(raw) = std::env::var("BIODASH_RETRY_JITTER") {
        config.retry_jitter = parse_bool(&raw);
    }
    if let Ok(raw) = std::env::var("BIODASH_REQUEST_TIMEOUT_MS") {
        config.request_timeout_ms = parse_positive_u64(&raw, "BIODASH_REQUEST_TIMEOUT_MS")?;
    }

    // 5. Validate.
    validate_config(&config)?;

    Ok(config)
}
