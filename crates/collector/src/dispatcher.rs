//! Collection dispatcher.
//!
//! A single long-lived task that, every `scan_interval`, lists GPU VMs from
//! the [`Inventory`], probes them with at most `worker_pool_size` probes in
//! flight, and stores every successful reading in the [`MetricsCache`].
//!
//! Cycles never overlap: [`CollectionDispatcher::run_cycle`] holds a
//! single-flight guard for its whole duration. The loop observes its
//! [`CancellationToken`] both while sleeping and while probes are in flight;
//! dropping in-flight probes kills their remote processes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use gpuvm_core::cache::MetricsCache;
use gpuvm_core::types::Timestamp;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::CollectorConfig;
use crate::error::CycleError;
use crate::inventory::Inventory;
use crate::probe::Prober;

/// Outcome of one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: Timestamp,
    pub targets: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    /// The cycle was interrupted by shutdown before every probe finished.
    pub cancelled: bool,
}

pub struct CollectionDispatcher {
    inventory: Arc<dyn Inventory>,
    prober: Arc<Prober>,
    cache: Arc<MetricsCache>,
    scan_interval: Duration,
    worker_pool_size: usize,
    cycle_guard: Mutex<()>,
    last_report: RwLock<Option<CycleReport>>,
}

impl CollectionDispatcher {
    pub fn new(
        inventory: Arc<dyn Inventory>,
        prober: Arc<Prober>,
        cache: Arc<MetricsCache>,
        config: &CollectorConfig,
    ) -> Self {
        Self::with_settings(
            inventory,
            prober,
            cache,
            config.scan_interval,
            config.worker_pool_size,
        )
    }

    pub fn with_settings(
        inventory: Arc<dyn Inventory>,
        prober: Arc<Prober>,
        cache: Arc<MetricsCache>,
        scan_interval: Duration,
        worker_pool_size: usize,
    ) -> Self {
        Self {
            inventory,
            prober,
            cache,
            scan_interval,
            worker_pool_size: worker_pool_size.max(1),
            cycle_guard: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    pub fn inventory(&self) -> &Arc<dyn Inventory> {
        &self.inventory
    }

    /// Report of the most recently finished cycle, if any.
    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Run cycles until `cancel` is triggered.
    ///
    /// The first cycle starts immediately; afterwards the loop sleeps
    /// `scan_interval` after each cycle finishes. Cycle failures are logged
    /// and never end the loop.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            scan_interval_secs = self.scan_interval.as_secs(),
            worker_pool_size = self.worker_pool_size,
            "Collection dispatcher started",
        );

        loop {
            match self.run_cycle(&cancel).await {
                Ok(report) => {
                    tracing::info!(
                        targets = report.targets,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        elapsed_ms = report.elapsed_ms,
                        "Collection cycle finished",
                    );
                }
                Err(CycleError::AlreadyRunning) => {
                    tracing::warn!("Previous collection cycle still running, skipping");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Collection cycle skipped");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Collection dispatcher shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.scan_interval) => {}
            }
        }
    }

    /// Run one cycle: list targets, probe them, store successes.
    ///
    /// Fails only when the inventory cannot be listed (no probes are
    /// attempted) or another cycle holds the guard. Per-VM probe failures
    /// are logged and counted in the report.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, CycleError> {
        let _guard = self
            .cycle_guard
            .try_lock()
            .map_err(|_| CycleError::AlreadyRunning)?;

        let started_at = Utc::now();
        let start = Instant::now();

        tracing::info!("Querying inventory for active GPU VMs");
        let targets = self.inventory.list_targets().await?;
        tracing::info!(count = targets.len(), "Found VMs with GPUs assigned");

        let mut report = CycleReport {
            started_at,
            targets: targets.len(),
            succeeded: 0,
            failed: 0,
            elapsed_ms: 0,
            cancelled: false,
        };

        let concurrency = self.worker_pool_size.min(targets.len()).max(1);
        let prober = &self.prober;

        let mut probes = stream::iter(targets)
            .map(|target| async move {
                let result = prober.probe(&target).await;
                (target, result)
            })
            .buffer_unordered(concurrency);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    tracing::warn!(
                        outstanding = report.targets - report.succeeded - report.failed,
                        "Collection cycle cancelled, dropping in-flight probes",
                    );
                    break;
                }
                next = probes.next() => match next {
                    Some((target, Ok(text))) => {
                        self.cache.store(target.vm_id, text).await;
                        report.succeeded += 1;
                        tracing::debug!(vm_id = target.vm_id, host = %target.host, "Metrics stored");
                    }
                    Some((target, Err(e))) => {
                        report.failed += 1;
                        tracing::warn!(
                            vm_id = target.vm_id,
                            host = %target.host,
                            error = %e,
                            "Skipping storage: no metrics retrieved",
                        );
                    }
                    None => break,
                },
            }
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        *self.last_report.write().await = Some(report.clone());

        Ok(report)
    }
}
