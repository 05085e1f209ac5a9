//! Shared types, errors, and configuration for the biodash workspace.

pub mod config;
pub mod error;
pub mod types;

pub use error::Error;
pub use types::{ApiInfo, BiorhythmPoint, BiorhythmSeries, CalculationAck, Person};
