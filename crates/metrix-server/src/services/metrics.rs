//! Update / lookup / report pipeline.
//!
//! Errors leave this service already classified: conversion problems are
//! `BadRequest` (or `NotImplemented` for an unknown type), storage problems
//! are internal, and a lookup miss stays `NotFound`.

use std::sync::Arc;

use tracing::debug;

use metrix_core::error::{ClientCode, MetrixError, Result};
use metrix_core::protocol::{Converter, MetricMessage};
use metrix_core::Metric;

use crate::report::render_report;
use crate::storage::MetricsStorage;

#[derive(Clone)]
pub struct MetricsService {
    storage: Arc<dyn MetricsStorage>,
    converter: Converter,
}

fn conversion_error(e: MetrixError) -> MetrixError {
    match e.client_code() {
        ClientCode::BadRequest | ClientCode::NotImplemented => e,
        _ => MetrixError::BadRequest(e.to_string()),
    }
}

fn storage_error(e: MetrixError) -> MetrixError {
    match e {
        MetrixError::Storage(_) | MetrixError::NotFound { .. } => e,
        other => MetrixError::Storage(other.to_string()),
    }
}

impl MetricsService {
    pub fn new(storage: Arc<dyn MetricsStorage>, converter: Converter) -> Self {
        Self { storage, converter }
    }

    /// Convert, apply and re-encode a batch. Nothing is applied unless every
    /// message converts.
    pub async fn update(&self, msgs: Vec<MetricMessage>) -> Result<Vec<MetricMessage>> {
        let metrics = msgs
            .iter()
            .map(|m| self.converter.from_message(m))
            .collect::<Result<Vec<Metric>>>()
            .map_err(conversion_error)?;

        let updated = self
            .storage
            .add_metric_values(&metrics)
            .await
            .map_err(storage_error)?;
        debug!(count = updated.len(), "metrics updated");

        updated
            .iter()
            .map(|m| self.converter.to_message(m))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| MetrixError::Internal(format!("encode response failed: {e}")))
    }

    /// Resolve one metric by `(type, id)`; the payload fields are ignored.
    pub async fn lookup(&self, query: &MetricMessage) -> Result<Metric> {
        let (kind, name) = Converter::identity(query).map_err(conversion_error)?;
        self.storage.get_metric(kind, name).await.map_err(storage_error)
    }

    /// [`lookup`](Self::lookup) rendered as a (signed) wire message.
    pub async fn lookup_message(&self, query: &MetricMessage) -> Result<MetricMessage> {
        let metric = self.lookup(query).await?;
        self.converter
            .to_message(&metric)
            .map_err(|e| MetrixError::Internal(format!("encode response failed: {e}")))
    }

    /// HTML page listing every metric.
    pub async fn report(&self) -> Result<String> {
        let snapshot = self.storage.get_metric_values().await.map_err(storage_error)?;
        Ok(render_report(&snapshot))
    }

    pub async fn ping(&self) -> Result<()> {
        self.storage.ping().await.map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use metrix_core::{MetricValue, Signer};

    use super::*;
    use crate::storage::MemoryStorage;

    fn service(signer: Signer) -> MetricsService {
        MetricsService::new(Arc::new(MemoryStorage::new()), Converter::new(signer))
    }

    fn counter(id: &str, delta: i64) -> MetricMessage {
        let mut m = MetricMessage::query(id, "counter");
        m.delta = Some(delta);
        m
    }

    #[tokio::test]
    async fn update_returns_running_totals() {
        let svc = service(Signer::disabled());
        svc.update(vec![counter("c", 100)]).await.unwrap();
        let out = svc.update(vec![counter("c", 5)]).await.unwrap();
        assert_eq!(out[0].delta, Some(105));

        let m = svc.lookup(&MetricMessage::query("c", "counter")).await.unwrap();
        assert_eq!(m.value(), MetricValue::Counter(105));
    }

    #[tokio::test]
    async fn bad_message_rejects_whole_batch() {
        let svc = service(Signer::disabled());
        let err = svc
            .update(vec![counter("ok", 1), MetricMessage::query("g", "gauge")])
            .await
            .unwrap_err();
        assert_eq!(err.client_code(), ClientCode::BadRequest);
        assert!(svc.lookup(&MetricMessage::query("ok", "counter")).await.is_err());
    }

    #[tokio::test]
    async fn responses_are_signed_when_enabled() {
        let signer = Signer::new("secret");
        let svc = service(signer.clone());
        let out = svc.update(vec![counter("c", 2)]).await.unwrap();
        let verified = Converter::new(signer).from_message(&out[0]).unwrap();
        assert_eq!(verified.value(), MetricValue::Counter(2));
    }

    #[tokio::test]
    async fn lookup_classifies_errors() {
        let svc = service(Signer::disabled());
        let miss = svc.lookup(&MetricMessage::query("x", "gauge")).await.unwrap_err();
        assert_eq!(miss.client_code(), ClientCode::NotFound);
        let unknown = svc.lookup(&MetricMessage::query("x", "meter")).await.unwrap_err();
        assert_eq!(unknown.client_code(), ClientCode::NotImplemented);
    }

    #[tokio::test]
    async fn report_lists_metrics() {
        let svc = service(Signer::disabled());
        svc.update(vec![counter("PollCount", 3)]).await.unwrap();
        let page = svc.report().await.unwrap();
        assert!(page.contains("PollCount"));
        svc.ping().await.unwrap();
    }
}
