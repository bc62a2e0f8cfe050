//! Error handling for p2p-rates
//!
//! Defines the error taxonomy of a run and establishes a unified Result type
//! using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Failure kinds a rate update can run into
#[derive(Error, Debug)]
pub enum RatesError {
    /// Fetching a median failed (network, parse, browser automation).
    /// Recovered per currency and treated as an absent price.
    #[error("price source error: {0}")]
    PriceSource(String),

    /// The currency code is not in the key column of the tab.
    #[error("row not found for key {key:?}")]
    RowNotFound { key: String },

    #[error("credential error: {0}")]
    Credential(String),

    #[error("spreadsheet access error: {0}")]
    SpreadsheetAccess(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for application-level operations
pub type Result<T> = anyhow::Result<T>;
