//! JSON file store.
//!
//! Every mutating call rewrites the full record set (written to a sibling
//! temporary file, then renamed over the target). Reads re-read the file and
//! filter. One mutex serializes all access since the file has no concurrency
//! control of its own. Without a path the store is a no-op.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use metrix_core::error::{MetrixError, Result};
use metrix_core::{Metric, MetricKind, MetricValue};

use super::{not_found, parse_snapshot, MetricsStorage, Snapshot};

/// One persisted `(type, name, value)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    #[serde(rename = "type")]
    mtype: String,
    name: String,
    value: String,
}

impl Record {
    fn of(metric: &Metric) -> Self {
        Self {
            mtype: metric.kind().to_string(),
            name: metric.name().to_string(),
            value: metric.string_value(),
        }
    }
}

pub struct FileStorage {
    path: Option<PathBuf>,
    guard: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            guard: Mutex::new(()),
        }
    }

    /// Store that accepts every call and persists nothing.
    pub fn disabled() -> Self {
        Self {
            path: None,
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn read_records(path: &Path) -> Result<Vec<Record>> {
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                MetrixError::Storage(format!("corrupt metrics file {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(MetrixError::Storage(format!(
                "read {} failed: {e}",
                path.display()
            ))),
        }
    }

    async fn write_records(path: &Path, records: &[Record]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| MetrixError::Internal(format!("encode metrics file failed: {e}")))?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| MetrixError::Storage(format!("write {} failed: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| MetrixError::Storage(format!("rename to {} failed: {e}", path.display())))
    }
}

#[async_trait]
impl MetricsStorage for FileStorage {
    #[tracing::instrument(skip_all, fields(batch = metrics.len()))]
    async fn add_metric_values(&self, metrics: &[Metric]) -> Result<Vec<Metric>> {
        let Some(path) = self.path.as_deref() else {
            return Ok(metrics.to_vec());
        };
        let _g = self.guard.lock().await;

        let mut records = Self::read_records(path).await?;
        let mut out = Vec::with_capacity(metrics.len());
        for incoming in metrics {
            let kind = incoming.kind();
            let pos = records
                .iter()
                .position(|r| r.mtype == kind.as_str() && r.name == incoming.name());
            let merged = match pos {
                Some(i) => {
                    let current = MetricValue::parse(kind, &records[i].value)?;
                    let next = Metric::new(incoming.name(), current);
                    next.set_value(incoming.value())?;
                    records[i] = Record::of(&next);
                    next
                }
                None => {
                    let next = Metric::new(incoming.name(), incoming.value().finite()?);
                    records.push(Record::of(&next));
                    next
                }
            };
            out.push(merged);
        }

        Self::write_records(path, &records).await?;
        Ok(out)
    }

    async fn get_metric_values(&self) -> Result<Snapshot> {
        let Some(path) = self.path.as_deref() else {
            return Ok(Snapshot::new());
        };
        let _g = self.guard.lock().await;

        let mut snap = Snapshot::new();
        for r in Self::read_records(path).await? {
            snap.entry(r.mtype).or_default().insert(r.name, r.value);
        }
        Ok(snap)
    }

    async fn get_metric(&self, kind: MetricKind, name: &str) -> Result<Metric> {
        let Some(path) = self.path.as_deref() else {
            return Err(not_found(kind, name));
        };
        let _g = self.guard.lock().await;

        let records = Self::read_records(path).await?;
        let record = records
            .into_iter()
            .find(|r| r.mtype == kind.as_str() && r.name == name)
            .ok_or_else(|| not_found(kind, name))?;
        Metric::parse(kind, record.name, &record.value)
    }

    #[tracing::instrument(skip_all)]
    async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        let parsed = parse_snapshot(snapshot)?;
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let records: Vec<Record> = parsed.iter().map(Record::of).collect();

        let _g = self.guard.lock().await;
        Self::write_records(path, &records).await
    }

    async fn ping(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let meta = tokio::fs::metadata(dir)
            .await
            .map_err(|e| MetrixError::Storage(format!("metrics dir {}: {e}", dir.display())))?;
        if !meta.is_dir() {
            return Err(MetrixError::Storage(format!("{} is not a directory", dir.display())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileStorage {
        FileStorage::new(dir.path().join("metrics.json"))
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.get_metric_values().await.unwrap().is_empty());
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn add_merges_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .add_metric_values(&[Metric::counter("c", 100), Metric::gauge("g", 1.5)])
            .await
            .unwrap();
        let out = store
            .add_metric_values(&[Metric::counter("c", 5), Metric::gauge("g", 4.0)])
            .await
            .unwrap();
        assert_eq!(out[0].value(), MetricValue::Counter(105));
        assert_eq!(out[1].value(), MetricValue::Gauge(4.0));

        // a second instance sees the same content
        let reopened = store_in(&dir);
        let c = reopened.get_metric(MetricKind::Counter, "c").await.unwrap();
        assert_eq!(c.value(), MetricValue::Counter(105));
        assert!(reopened.get_metric(MetricKind::Gauge, "c").await.is_err());
    }

    #[tokio::test]
    async fn restore_rewrites_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.add_metric_values(&[Metric::counter("old", 1)]).await.unwrap();

        let mut snap = Snapshot::new();
        snap.entry("gauge".into()).or_default().insert("g".into(), "2.5".into());
        store.restore(&snap).await.unwrap();
        assert_eq!(store.get_metric_values().await.unwrap(), snap);

        let mut bad = Snapshot::new();
        bad.entry("meter".into()).or_default().insert("m".into(), "1".into());
        assert!(store.restore(&bad).await.is_err());
        assert_eq!(store.get_metric_values().await.unwrap(), snap);
    }

    #[tokio::test]
    async fn corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        tokio::fs::write(dir.path().join("metrics.json"), b"{not json").await.unwrap();
        assert!(matches!(
            store.get_metric_values().await,
            Err(MetrixError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn disabled_store_is_noop() {
        let store = FileStorage::disabled();
        let out = store.add_metric_values(&[Metric::counter("c", 3)]).await.unwrap();
        assert_eq!(out.len(), 1);
        assert!(store.get_metric_values().await.unwrap().is_empty());
        assert!(store.get_metric(MetricKind::Counter, "c").await.is_err());
        store.restore(&Snapshot::new()).await.unwrap();
        store.ping().await.unwrap();
    }
}
