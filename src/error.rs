//! Error types for the FreeIPA exporter

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the FreeIPA exporter
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Host-level errors (absorbed per host by the scraper)
    // =========================================================================
    /// Connection, bind or naming-context check failed
    #[error("Host {host} unreachable: {reason}")]
    HostUnreachable { host: String, reason: String },

    /// Attribute value could not be normalized to a number
    #[error("Invalid metric value: {value:?}")]
    InvalidMetricValue { value: String },

    /// A probe query failed after the connection was established
    #[error("Probe query against {host} failed: {reason}")]
    Probe { host: String, reason: String },

    // =========================================================================
    // Pass-level errors
    // =========================================================================
    /// The aggregation pass itself failed
    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    /// Prometheus registry or encoder error
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    // =========================================================================
    // Process-level errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
