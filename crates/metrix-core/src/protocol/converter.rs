//! Metric <-> wire message conversion with optional signing.

use crate::error::{MetrixError, Result};
use crate::metric::{Metric, MetricKind, MetricValue};
use crate::protocol::message::MetricMessage;
use crate::signer::Signer;

/// Converts between [`Metric`] and [`MetricMessage`], signing outgoing
/// messages and verifying incoming hashes when the signer is enabled.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    signer: Signer,
}

impl Converter {
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Snapshot `metric` into a message; `delta` xor `value` is populated per
    /// type and a hash is attached when signing is enabled.
    pub fn to_message(&self, metric: &Metric) -> Result<MetricMessage> {
        // Read once so the payload and the hash describe the same value.
        let snapshot = metric.detached();
        let mut msg = MetricMessage::query(snapshot.name(), snapshot.kind().as_str());
        match snapshot.value() {
            MetricValue::Counter(delta) => msg.delta = Some(delta),
            MetricValue::Gauge(value) => msg.value = Some(value),
        }
        if self.signer.is_enabled() {
            msg.hash = Some(hex::encode(self.signer.sign(&snapshot)?));
        }
        Ok(msg)
    }

    /// Build a metric from a message.
    ///
    /// A message without a hash is accepted even when signing is enabled;
    /// a hash that is present must verify.
    pub fn from_message(&self, msg: &MetricMessage) -> Result<Metric> {
        let kind: MetricKind = msg.mtype.parse()?;
        if msg.id.is_empty() {
            return Err(MetrixError::BadRequest("metric id must not be empty".into()));
        }

        let value = match kind {
            MetricKind::Counter => msg.delta.map(MetricValue::Counter),
            MetricKind::Gauge => msg.value.map(MetricValue::Gauge),
        }
        .ok_or_else(|| MetrixError::MissingValue(msg.id.clone()))?
        .finite()?;

        let metric = Metric::new(msg.id.clone(), value);

        if let (true, Some(hash)) = (self.signer.is_enabled(), msg.hash.as_deref()) {
            let tag = hex::decode(hash).map_err(|_| MetrixError::InvalidSignature(msg.id.clone()))?;
            if !self.signer.verify(&metric, &tag)? {
                tracing::debug!(id = %msg.id, "metric hash mismatch");
                return Err(MetrixError::InvalidSignature(msg.id.clone()));
            }
        }

        Ok(metric)
    }

    /// Kind and name of a lookup message, without requiring a payload.
    pub fn identity(msg: &MetricMessage) -> Result<(MetricKind, &str)> {
        let kind: MetricKind = msg.mtype.parse()?;
        if msg.id.is_empty() {
            return Err(MetrixError::BadRequest("metric id must not be empty".into()));
        }
        Ok((kind, msg.id.as_str()))
    }
}
