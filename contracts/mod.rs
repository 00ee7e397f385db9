//! Upstream Monitor Contracts
//!
//! Shared data contracts for observations, snapshots and run reports.

mod run_report;
mod snapshot;

pub use run_report::*;
pub use snapshot::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One fetch result for one monitored target in one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Stable identifier of the monitored thing (a repo path, a URL)
    pub target_id: String,

    /// Opaque comparison key (commit SHA, version string); absent when
    /// the fetch or the extraction failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Fetch timestamp
    pub observed_at: DateTime<Utc>,

    /// Contextual metadata carried into messages, never compared
    #[serde(default)]
    pub detail: TargetDetail,

    /// Error description when the target could not be resolved this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl Observation {
    /// Create a resolved observation
    pub fn resolved(
        target_id: impl Into<String>,
        fingerprint: impl Into<String>,
        detail: TargetDetail,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            fingerprint: Some(fingerprint.into()),
            observed_at: Utc::now(),
            detail,
            fetch_error: None,
        }
    }

    /// Create an observation for a failed fetch or extraction
    pub fn failed(target_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            fingerprint: None,
            observed_at: Utc::now(),
            detail: TargetDetail::default(),
            fetch_error: Some(error.into()),
        }
    }

    /// Attach detail to a failed observation (e.g. the resolved URL of a
    /// page whose version token was not found)
    pub fn with_detail(mut self, detail: TargetDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Whether this observation contributes nothing usable to the run
    pub fn is_unusable(&self) -> bool {
        self.fingerprint.is_none() && self.fetch_error.is_some()
    }
}

/// Contextual metadata for a target, carried into messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDetail {
    /// Upstream timestamp (e.g. commit date), as reported by the source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Browsable or resolved URL for the observed state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TargetDetail {
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.url.is_none()
    }
}

/// Classification outcome of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// First-ever run; baseline recorded
    Startup,
    /// At least one known fingerprint changed
    Change,
    /// No change, but the silence period elapsed
    Healthcheck,
    /// Nothing to notify
    None,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Change => "change",
            Self::Healthcheck => "healthcheck",
            Self::None => "none",
        }
    }

    /// Whether this event produces a notification
    pub fn notifies(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Channel a notification was delivered through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Primary,
    Fallback,
}
