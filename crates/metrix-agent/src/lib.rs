//! metrix agent library entry.
//!
//! Collects process and host metrics on one interval and pushes them to a
//! metrix server on another. Counters accumulate locally until the server
//! acknowledges them.

pub mod agent;
pub mod collector;
pub mod config;
pub mod pusher;

pub use agent::Agent;
pub use collector::{Collector, MetricsProvider};
pub use pusher::Pusher;
