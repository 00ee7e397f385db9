//! Run controller
//!
//! Orchestrates one end-to-end pass: probes, prior snapshot, change engine,
//! snapshot persistence, run report. The snapshot is persisted at most once
//! per run, synchronously, after classification completes.

use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::contracts::{compute_inputs_hash, Observation, RunReport};
use crate::engine::ChangeEngine;
use crate::error::{MonitorError, Result};
use crate::notify::Notifier;
use crate::probe::Probe;
use crate::snapshot::SnapshotStore;

/// Drives one monitor pass from probes to persisted snapshot
pub struct RunController {
    config: MonitorConfig,
    probes: Vec<Box<dyn Probe>>,
    store: SnapshotStore,
    notifier: Notifier,
    engine: ChangeEngine,
}

impl RunController {
    pub fn new(config: MonitorConfig, probes: Vec<Box<dyn Probe>>) -> Result<Self> {
        let store = SnapshotStore::new(config.state_path.clone());
        let notifier = Notifier::from_config(&config.notify)?;
        let engine = ChangeEngine::new(config.label.clone(), config.healthcheck_interval);

        Ok(Self {
            config,
            probes,
            store,
            notifier,
            engine,
        })
    }

    /// Execute one pass.
    ///
    /// Fatal outcomes are an unreadable or unwritable snapshot store and a
    /// run where every target failed to fetch. Delivery failures are logged
    /// in the report and never fail the run.
    pub async fn execute(&self) -> Result<RunReport> {
        let started = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        tracing::info!(monitor = %self.config.label, %run_id, "run started");

        let prior = self.store.load()?;

        let observations: Vec<Observation> =
            join_all(self.probes.iter().map(|probe| probe.observe()))
                .await
                .into_iter()
                .flatten()
                .collect();

        // Nothing comparable came back; classifying would only erode the
        // stored baseline. Holds for an empty probe set too.
        if observations.iter().all(|obs| obs.is_unusable()) {
            return Err(MonitorError::NoUsableObservations);
        }

        let now = Utc::now();
        let inputs_hash = compute_inputs_hash(&observations);

        let (outcome, receipt) = self
            .engine
            .run(&prior, &observations, now, &self.notifier)
            .await;

        self.store.save(&outcome.snapshot)?;

        let report = RunReport {
            run_id,
            monitor: self.config.label.clone(),
            event: outcome.event,
            inputs_hash,
            targets_observed: observations.len() as u32,
            warnings: outcome.warnings.len() as u32,
            delivered_via: receipt.as_ref().and_then(|r| r.delivered_via),
            delivery_error: receipt.and_then(|r| r.error),
            started_at,
            completed_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(summary = %report.summary(), "run complete");

        Ok(report)
    }
}
