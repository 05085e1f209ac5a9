//! Authenticated, retrying client for the remote biorhythm API.
//!
//! Covers: person records, biorhythm series, calculation triggers.
//! Every request carries a bearer token; transient failures pass through
//! the retry policy, and a 401 gets exactly one token refresh before it
//! becomes terminal.

mod auth;
mod rest;
pub mod retry;

pub use auth::Credentials;
pub use rest::BiorhythmClient;
pub use retry::{FailureClass, RetryDecision, RetryPolicy};
