//! Error types for the upstream monitor
//!
//! Per-target fetch failures never surface here; probes fold them into the
//! observation. These types cover the failures that cross component
//! boundaries.

use thiserror::Error;

/// Main error type for monitor operations
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Probe construction or a whole-probe failure
    #[error("probe error: {0}")]
    Probe(String),

    /// Snapshot store read/write failure
    #[error("snapshot store error: {0}")]
    Store(String),

    /// Every target failed to fetch; the run produced nothing comparable
    #[error("no usable observations: every configured target failed to fetch")]
    NoUsableObservations,

    /// Notification delivery failure
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl MonitorError {
    pub fn store(msg: impl Into<String>) -> Self {
        MonitorError::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        MonitorError::Config(msg.into())
    }

    /// Whether this error must fail the run with a non-zero exit
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::Store(_) | MonitorError::NoUsableObservations | MonitorError::Config(_)
        )
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Store(format!("JSON error: {}", err))
    }
}

/// Notification delivery failure, pattern-matched by the retry loop
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Client-side rejection; retrying cannot succeed
    #[error("permanent delivery rejection ({status}): {message}")]
    Permanent { status: u16, message: String },

    /// Server or network failure; retried until attempts exhaust
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Recipients configured but delivery credentials missing
    #[error("delivery misconfigured: {0}")]
    Config(String),
}

impl DeliveryError {
    /// Whether further retries on the same channel are pointless
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Permanent { .. } | DeliveryError::Config(_))
    }

    /// Classify an HTTP status the way the email endpoint reports it
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if (400..500).contains(&status) {
            DeliveryError::Permanent {
                status,
                message: message.into(),
            }
        } else {
            DeliveryError::Transient(format!("status {}: {}", status, message.into()))
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Transient(err.to_string())
    }
}

/// Result type alias for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;
