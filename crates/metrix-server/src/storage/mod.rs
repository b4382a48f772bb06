//! Metric storage backends.
//!
//! The server talks to storage only through [`MetricsStorage`], so the memory
//! map, the JSON file and the SQLite database are interchangeable. The
//! [`DualWriteStorage`] strategy composes the memory store (path of record)
//! with one durable backup.

pub mod database;
pub mod file;
pub mod memory;
pub mod strategy;

use std::collections::BTreeMap;

use async_trait::async_trait;

use metrix_core::error::{MetrixError, Result};
use metrix_core::{Metric, MetricKind};

pub use database::DatabaseStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use strategy::{run_backup_loop, DualWriteStorage, SyncMode};

/// Point-in-time view: `type -> name -> string value`, sorted by key.
pub type Snapshot = BTreeMap<String, BTreeMap<String, String>>;

#[async_trait]
pub trait MetricsStorage: Send + Sync {
    /// Merge a batch (counters add, gauges overwrite) and return, for every
    /// input in input order, a detached metric holding the value right after
    /// that input was applied. Non-finite gauges are rejected.
    async fn add_metric_values(&self, metrics: &[Metric]) -> Result<Vec<Metric>>;

    /// Full snapshot of every stored metric.
    async fn get_metric_values(&self) -> Result<Snapshot>;

    /// Single metric; `NotFound` when absent.
    async fn get_metric(&self, kind: MetricKind, name: &str) -> Result<Metric>;

    /// Replace the whole content with `snapshot`. All-or-nothing: a snapshot
    /// that fails to parse leaves the previous content untouched.
    async fn restore(&self, snapshot: &Snapshot) -> Result<()>;

    /// Health check of the underlying store.
    async fn ping(&self) -> Result<()>;
}

/// Parse every entry of a snapshot, failing on the first unknown type or
/// malformed value.
pub fn parse_snapshot(snapshot: &Snapshot) -> Result<Vec<Metric>> {
    let mut out = Vec::new();
    for (mtype, entries) in snapshot {
        let kind: MetricKind = mtype.parse()?;
        for (name, raw) in entries {
            out.push(Metric::parse(kind, name.clone(), raw)?);
        }
    }
    Ok(out)
}

/// Build a snapshot from metrics.
pub fn snapshot_of<'a>(metrics: impl IntoIterator<Item = &'a Metric>) -> Snapshot {
    let mut snap = Snapshot::new();
    for m in metrics {
        snap.entry(m.kind().to_string())
            .or_default()
            .insert(m.name().to_string(), m.string_value());
    }
    snap
}

pub(crate) fn not_found(kind: MetricKind, name: &str) -> MetrixError {
    MetrixError::NotFound {
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use metrix_core::MetricValue;

    use super::*;

    #[test]
    fn snapshot_parses_back() {
        let metrics = vec![Metric::counter("c", 100), Metric::gauge("g", 1.5)];
        let snap = snapshot_of(&metrics);
        assert_eq!(snap["counter"]["c"], "100");
        assert_eq!(snap["gauge"]["g"], "1.5");

        let parsed = parse_snapshot(&snap).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].value(), MetricValue::Counter(100));
        assert_eq!(parsed[1].value(), MetricValue::Gauge(1.5));
    }

    #[test]
    fn snapshot_rejects_unknown_type_and_bad_value() {
        let mut snap = Snapshot::new();
        snap.entry("histogram".into()).or_default().insert("h".into(), "1".into());
        assert!(matches!(parse_snapshot(&snap), Err(MetrixError::UnknownMetricType(_))));

        let mut snap = Snapshot::new();
        snap.entry("counter".into()).or_default().insert("c".into(), "1.5".into());
        assert!(matches!(parse_snapshot(&snap), Err(MetrixError::Parse { .. })));
    }
}
