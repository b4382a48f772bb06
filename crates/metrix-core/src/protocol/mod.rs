//! Wire protocol: the transport-agnostic metric message and the converter
//! between it and the [`Metric`](crate::metric::Metric) value model.
//!
//! The message is encoding-neutral; the HTTP transport carries it as JSON with
//! the hash hex-encoded. Conversion is panic-free: malformed messages surface
//! as `MetrixError` so the server can map them to a response status.

pub mod converter;
pub mod message;

pub use converter::Converter;
pub use message::MetricMessage;
