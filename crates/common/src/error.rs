//! Unified error type for the dashboard data layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited (retry-after hint: {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("API rejected request (status={status}): {message}")]
    ClientRequest { status: u16, message: String },

    #[error("API server error (status={status}): {message}")]
    Server { status: u16, message: String },

    #[error("invalid response payload: {0}")]
    DataValidation(String),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
