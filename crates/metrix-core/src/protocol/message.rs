//! Metric wire message (JSON form).

use serde::{Deserialize, Serialize};

/// Metric update / response message.
///
/// Exactly one of `delta` (counter) or `value` (gauge) is expected; the type
/// is kept as a string so unknown types reach the converter instead of failing
/// deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricMessage {
    /// Metric name.
    pub id: String,
    /// Metric type (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub mtype: String,
    /// Counter increment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    /// Gauge value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Hex-encoded HMAC-SHA256 over `"id:type:value"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl MetricMessage {
    /// Lookup request: identity only, no payload.
    pub fn query(id: impl Into<String>, mtype: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mtype: mtype.into(),
            delta: None,
            value: None,
            hash: None,
        }
    }
}
