//! Probes
//!
//! Pluggable fetch-and-extract routines, one per class of monitored target.
//! A probe is total: fetch and parse failures degrade to observations with
//! an absent fingerprint and a populated `fetch_error`, so the engine can
//! proceed with the rest of the batch.

mod commits;
mod pages;

pub use commits::CommitProbe;
pub use pages::PageProbe;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::contracts::Observation;

/// Timeout applied to every probe fetch
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A fetch-and-extract routine for one monitor instance
pub trait Probe: Send + Sync {
    /// Probe identifier
    fn id(&self) -> &str;

    /// Produce one observation per configured target. Never fails the run;
    /// unreachable targets come back with `fetch_error` set.
    fn observe(&self) -> Pin<Box<dyn Future<Output = Vec<Observation>> + Send + '_>>;
}
