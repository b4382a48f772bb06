//! metrix server library entry.
//!
//! Wires the strict config, the storage backends (memory of record plus a
//! file or SQLite backup), the metrics service and the axum transport into
//! one router. Consumed by the `metrix-server` binary and by integration
//! tests.

pub mod app_state;
pub mod config;
pub mod policy;
pub mod report;
pub mod router;
pub mod services;
pub mod storage;
pub mod transport;
