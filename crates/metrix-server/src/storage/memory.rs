//! In-memory metric map (the read/write path of record).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use metrix_core::error::Result;
use metrix_core::{Metric, MetricKind};

use super::{not_found, parse_snapshot, snapshot_of, MetricsStorage, Snapshot};

type MetricMap = HashMap<MetricKind, HashMap<String, Metric>>;

/// `type -> name -> Metric`. Readers share the lock; `add_metric_values` and
/// `restore` hold it exclusively for the whole mutation.
#[derive(Default)]
pub struct MemoryStorage {
    metrics: RwLock<MetricMap>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsStorage for MemoryStorage {
    async fn add_metric_values(&self, metrics: &[Metric]) -> Result<Vec<Metric>> {
        let mut map = self.metrics.write().await;
        let mut out = Vec::with_capacity(metrics.len());
        for incoming in metrics {
            let slot = map.entry(incoming.kind()).or_default();
            // Stored cells are never shared with callers; `out` gets the
            // value each step produced.
            let value = match slot.get(incoming.name()) {
                Some(existing) => existing.set_value(incoming.value())?,
                None => {
                    let value = incoming.value().finite()?;
                    slot.insert(incoming.name().to_string(), Metric::new(incoming.name(), value));
                    value
                }
            };
            out.push(Metric::new(incoming.name(), value));
        }
        Ok(out)
    }

    async fn get_metric_values(&self) -> Result<Snapshot> {
        let map = self.metrics.read().await;
        Ok(snapshot_of(map.values().flat_map(|by_name| by_name.values())))
    }

    async fn get_metric(&self, kind: MetricKind, name: &str) -> Result<Metric> {
        let map = self.metrics.read().await;
        map.get(&kind)
            .and_then(|by_name| by_name.get(name))
            .cloned()
            .ok_or_else(|| not_found(kind, name))
    }

    async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        // Parse fully before taking the lock so a bad snapshot changes nothing.
        let parsed = parse_snapshot(snapshot)?;
        let mut fresh = MetricMap::new();
        for m in parsed {
            fresh
                .entry(m.kind())
                .or_default()
                .insert(m.name().to_string(), m);
        }
        *self.metrics.write().await = fresh;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
