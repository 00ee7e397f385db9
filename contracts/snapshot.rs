//! Durable snapshot record
//!
//! Last-known external state plus notification bookkeeping, one record per
//! monitor instance. Timestamps serialize as RFC 3339 UTC; anything else is
//! rejected at load time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::TargetDetail;

/// Persisted process-wide state for one monitor instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// False only before the first run ever completed
    #[serde(default)]
    pub initialized: bool,

    /// Last-known state per target id
    #[serde(default)]
    pub targets: BTreeMap<String, TargetState>,

    /// Timestamp of the most recent run, updated on every run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Timestamp of the most recent healthcheck notification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_healthcheck_sent_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Stored fingerprint for a target, if any
    pub fn fingerprint(&self, target_id: &str) -> Option<&str> {
        self.targets
            .get(target_id)
            .and_then(|state| state.fingerprint.as_deref())
    }
}

/// Last-known state of one target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    /// Fingerprint recorded for the target; absent when the baseline fetch
    /// never resolved one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Detail recorded alongside the fingerprint
    #[serde(default)]
    pub detail: TargetDetail,
}
