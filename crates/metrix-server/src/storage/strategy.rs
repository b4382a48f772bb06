//! Dual-write composition of the memory store with one durable backup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use metrix_core::error::Result;
use metrix_core::{Metric, MetricKind};

use super::{MemoryStorage, MetricsStorage, Snapshot};

/// How writes reach the backup store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every mutation is mirrored to the backup before returning; backup
    /// errors reach the caller.
    Synchronous,
    /// Mutations touch memory only; the backup is refreshed by
    /// [`DualWriteStorage::create_backup`] (see [`run_backup_loop`]).
    Asynchronous,
}

impl SyncMode {
    /// `0` means synchronous, anything else asynchronous.
    pub fn from_interval(store_interval_secs: u64) -> Self {
        if store_interval_secs == 0 {
            SyncMode::Synchronous
        } else {
            SyncMode::Asynchronous
        }
    }
}

/// Memory is the read/write path of record; `backup` is the durable copy.
pub struct DualWriteStorage {
    memory: MemoryStorage,
    backup: Arc<dyn MetricsStorage>,
    mode: SyncMode,
    // Held across the memory apply and the backup mirror in synchronous mode
    // so both layers see updates in the same order.
    write_guard: Mutex<()>,
}

impl DualWriteStorage {
    pub fn new(backup: Arc<dyn MetricsStorage>, mode: SyncMode) -> Self {
        Self {
            memory: MemoryStorage::new(),
            backup,
            mode,
            write_guard: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Write the full in-memory state over the backup.
    pub async fn create_backup(&self) -> Result<()> {
        let snapshot = self.memory.get_metric_values().await?;
        self.backup.restore(&snapshot).await?;
        debug!(types = snapshot.len(), "backup written");
        Ok(())
    }

    /// Replace the in-memory state with the backup's content.
    pub async fn restore_from_backup(&self) -> Result<()> {
        let snapshot = self.backup.get_metric_values().await?;
        let count: usize = snapshot.values().map(|by_name| by_name.len()).sum();
        self.memory.restore(&snapshot).await?;
        info!(metrics = count, "restored metrics from backup");
        Ok(())
    }
}

#[async_trait]
impl MetricsStorage for DualWriteStorage {
    async fn add_metric_values(&self, metrics: &[Metric]) -> Result<Vec<Metric>> {
        match self.mode {
            SyncMode::Asynchronous => self.memory.add_metric_values(metrics).await,
            SyncMode::Synchronous => {
                let _g = self.write_guard.lock().await;
                let out = self.memory.add_metric_values(metrics).await?;
                self.backup.add_metric_values(metrics).await?;
                Ok(out)
            }
        }
    }

    async fn get_metric_values(&self) -> Result<Snapshot> {
        self.memory.get_metric_values().await
    }

    async fn get_metric(&self, kind: MetricKind, name: &str) -> Result<Metric> {
        self.memory.get_metric(kind, name).await
    }

    async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        match self.mode {
            SyncMode::Asynchronous => self.memory.restore(snapshot).await,
            SyncMode::Synchronous => {
                let _g = self.write_guard.lock().await;
                self.memory.restore(snapshot).await?;
                self.backup.restore(snapshot).await
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        self.backup.ping().await
    }
}

/// Call `create_backup` every `period` until `cancel` fires. Failures are
/// logged and the loop keeps going.
pub async fn run_backup_loop(
    storage: Arc<DualWriteStorage>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut tick = tokio::time::interval(period);
    // the first tick completes immediately
    tick.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {}
        }
        if let Err(e) = storage.create_backup().await {
            warn!(error = %e, "periodic backup failed");
        }
    }
    debug!("backup loop stopped");
}
