//! Upstream Monitor
//!
//! Deterministic change detection over external upstream sources with
//! email and webhook notification delivery.
//!
//! One invocation is one pass: probe the configured targets, classify the
//! run against the persisted snapshot (STARTUP, CHANGE, HEALTHCHECK or
//! NONE), notify, persist. Scheduling belongs to the external trigger.
//!
//! # Design Principles
//! - Classification is pure and order-independent over the target batch
//! - Delivery outcome never influences the persisted snapshot
//! - Probes are total: per-target failures degrade, never abort the run

pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod probe;
pub mod runner;
pub mod snapshot;

// Contracts module - located at ../contracts relative to src/
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;
pub use error::{MonitorError, Result};
