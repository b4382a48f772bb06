//! Metric value model.
//!
//! A [`Metric`] is a named, typed value cell shared by handle. Cloning a
//! `Metric` clones the handle, not the value: collectors, the pusher and the
//! storage map all observe the same cell. Each cell serializes access to its
//! own value behind a per-instance lock, so updates to one metric never block
//! readers of another.
//!
//! Counter updates are additive (the stored value is the running total);
//! gauge updates overwrite.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{MetrixError, Result};
use crate::signer::{Signable, Signer};

/// Metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    /// Running total, reduced only by [`Metric::flush`] or
    /// [`Metric::acknowledge`].
    Counter,
    /// Point-in-time value, replaced on every update.
    Gauge,
}

impl MetricKind {
    /// Wire / path representation.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetrixError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            other => Err(MetrixError::UnknownMetricType(other.to_string())),
        }
    }
}

/// Numeric payload of a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Counter(i64),
    Gauge(f64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Gauge(_) => MetricKind::Gauge,
        }
    }

    /// Parse a textual value per `kind` (`i64` for counters, `f64` for gauges).
    pub fn parse(kind: MetricKind, raw: &str) -> Result<Self> {
        let parse_err = || MetrixError::Parse {
            kind: kind.to_string(),
            raw: raw.to_string(),
        };
        match kind {
            MetricKind::Counter => raw
                .trim()
                .parse::<i64>()
                .map(MetricValue::Counter)
                .map_err(|_| parse_err()),
            MetricKind::Gauge => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| parse_err())
                .and_then(|v| MetricValue::Gauge(v).finite()),
        }
    }

    /// Reject gauges that are NaN or infinite; they have no stable textual
    /// or stored form.
    pub fn finite(self) -> Result<Self> {
        match self {
            MetricValue::Gauge(v) if !v.is_finite() => Err(MetrixError::Parse {
                kind: MetricKind::Gauge.to_string(),
                raw: v.to_string(),
            }),
            other => Ok(other),
        }
    }
}

/// Canonical textual form: integer for counters, shortest round-trippable
/// decimal for gauges.
impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Counter(v) => write!(f, "{v}"),
            MetricValue::Gauge(v) => write!(f, "{v}"),
        }
    }
}

struct MetricCell {
    name: String,
    kind: MetricKind,
    value: Mutex<MetricValue>,
}

/// Shared handle to a named metric cell.
#[derive(Clone)]
pub struct Metric {
    inner: Arc<MetricCell>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self {
            inner: Arc::new(MetricCell {
                name: name.into(),
                kind: value.kind(),
                value: Mutex::new(value),
            }),
        }
    }

    pub fn counter(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, MetricValue::Counter(value))
    }

    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricValue::Gauge(value))
    }

    /// Build a metric from its textual value.
    pub fn parse(kind: MetricKind, name: impl Into<String>, raw: &str) -> Result<Self> {
        Ok(Self::new(name, MetricValue::parse(kind, raw)?))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> MetricKind {
        self.inner.kind
    }

    /// Current value. Never fails: a poisoned lock still holds a whole value
    /// since every write is a single assignment.
    pub fn value(&self) -> MetricValue {
        *self.lock()
    }

    /// Counter: add `update` to the running total. Gauge: replace the value.
    /// Returns the value after the update.
    pub fn set_value(&self, update: MetricValue) -> Result<MetricValue> {
        let update = update.finite()?;
        let mut current = self.lock();
        let next = match (*current, update) {
            (MetricValue::Counter(total), MetricValue::Counter(delta)) => {
                MetricValue::Counter(total.saturating_add(delta))
            }
            (MetricValue::Gauge(_), MetricValue::Gauge(v)) => MetricValue::Gauge(v),
            (current, update) => {
                return Err(MetrixError::KindMismatch {
                    name: self.name().to_string(),
                    expected: current.kind().to_string(),
                    actual: update.kind().to_string(),
                })
            }
        };
        *current = next;
        Ok(next)
    }

    /// Canonical string form of the current value.
    pub fn string_value(&self) -> String {
        self.value().to_string()
    }

    /// Reset a counter to zero after its total has been acknowledged.
    /// Gauges are left untouched.
    pub fn flush(&self) {
        let mut current = self.lock();
        if let MetricValue::Counter(_) = *current {
            *current = MetricValue::Counter(0);
        }
    }

    /// Subtract a delivered counter total, keeping whatever was added while
    /// it was in flight. Gauges and mismatched kinds are left untouched.
    pub fn acknowledge(&self, sent: MetricValue) {
        let mut current = self.lock();
        if let (MetricValue::Counter(total), MetricValue::Counter(delivered)) = (*current, sent) {
            *current = MetricValue::Counter(total.saturating_sub(delivered));
        }
    }

    /// Keyed digest of `"name:type:value"`.
    pub fn compute_digest(&self, signer: &Signer) -> Result<Vec<u8>> {
        signer.sign(self)
    }

    /// Independent copy with the current value; updates to either side are
    /// not seen by the other.
    pub fn detached(&self) -> Metric {
        Metric::new(self.name(), self.value())
    }

    /// Whether both handles point at the same cell.
    pub fn same_cell(&self, other: &Metric) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricValue> {
        self.inner.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Signable for Metric {
    fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(format!("{}:{}:{}", self.name(), self.kind(), self.value()).into_bytes())
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name())
            .field("value", &self.value())
            .finish()
    }
}
