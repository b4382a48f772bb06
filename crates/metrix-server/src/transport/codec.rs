//! Decode-once codec for update and lookup requests.
//!
//! - `/update/{type}/{name}/{value}` segments => one `MetricMessage`
//! - JSON bodies => one object, or (for batches) an array of objects

use bytes::Bytes;

use metrix_core::error::{MetrixError, Result};
use metrix_core::protocol::MetricMessage;
use metrix_core::{MetricKind, MetricValue};

/// Build an update message from path segments. The type is checked before the
/// value so an unknown type is reported as such even with a garbage value.
pub fn decode_path(mtype: &str, name: &str, raw: &str) -> Result<MetricMessage> {
    let kind: MetricKind = mtype.parse()?;
    let mut msg = MetricMessage::query(name, kind.as_str());
    match MetricValue::parse(kind, raw)? {
        MetricValue::Counter(d) => msg.delta = Some(d),
        MetricValue::Gauge(v) => msg.value = Some(v),
    }
    Ok(msg)
}

/// Exactly one JSON object.
pub fn decode_one(body: &Bytes) -> Result<MetricMessage> {
    serde_json::from_slice(body)
        .map_err(|e| MetrixError::BadRequest(format!("invalid metric json: {e}")))
}

/// A JSON array of objects; a lone object is accepted as a batch of one.
pub fn decode_batch(body: &Bytes) -> Result<Vec<MetricMessage>> {
    let first = body.iter().find(|b| !b.is_ascii_whitespace());
    if first == Some(&b'[') {
        serde_json::from_slice(body)
            .map_err(|e| MetrixError::BadRequest(format!("invalid metric batch json: {e}")))
    } else {
        decode_one(body).map(|m| vec![m])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_counter_and_gauge() {
        let c = decode_path("counter", "PollCount", "5").unwrap();
        assert_eq!((c.delta, c.value), (Some(5), None));
        let g = decode_path("gauge", "Alloc", "1.25").unwrap();
        assert_eq!((g.delta, g.value), (None, Some(1.25)));
    }

    #[test]
    fn path_errors_are_classified() {
        let e = decode_path("histogram", "h", "junk").unwrap_err();
        assert_eq!(e.client_code().as_str(), "NOT_IMPLEMENTED");
        assert_eq!(e.to_string(), "unknown metric type: histogram");

        let e = decode_path("counter", "c", "1.5").unwrap_err();
        assert_eq!(e.client_code().as_str(), "BAD_REQUEST");
        let e = decode_path("gauge", "g", "abc").unwrap_err();
        assert_eq!(e.client_code().as_str(), "BAD_REQUEST");
        for raw in ["NaN", "inf", "-Infinity"] {
            let e = decode_path("gauge", "g", raw).unwrap_err();
            assert_eq!(e.client_code().as_str(), "BAD_REQUEST");
        }
    }

    #[test]
    fn json_one_and_many() {
        let one = Bytes::from_static(br#"{"id":"g","type":"gauge","value":2.5}"#);
        assert_eq!(decode_one(&one).unwrap().value, Some(2.5));
        assert_eq!(decode_batch(&one).unwrap().len(), 1);

        let many = Bytes::from_static(
            br#"  [{"id":"c","type":"counter","delta":1},{"id":"g","type":"gauge","value":0}]"#,
        );
        let msgs = decode_batch(&many).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].delta, Some(1));
    }

    #[test]
    fn json_missing_identity_is_bad_request() {
        for body in [
            &br#"{"type":"gauge","value":1}"#[..],
            &br#"{"id":"g","value":1}"#[..],
            &b"not json"[..],
        ] {
            let e = decode_one(&Bytes::copy_from_slice(body)).unwrap_err();
            assert_eq!(e.client_code().as_str(), "BAD_REQUEST");
        }
        let e = decode_batch(&Bytes::from_static(b"[{\"id\":1}]")).unwrap_err();
        assert_eq!(e.client_code().as_str(), "BAD_REQUEST");
    }
}
