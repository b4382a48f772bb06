//! Request-handling services behind the HTTP handlers.

pub mod metrics;

pub use metrics::MetricsService;
