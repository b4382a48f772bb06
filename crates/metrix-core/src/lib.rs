//! metrix core: metric value model, integrity signer, wire message and
//! converter, and the error surface shared by the server and the agent.
//!
//! This crate carries no transport or runtime dependencies so both sides of
//! the push protocol can reuse it.
//!
//! # Panic policy
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `MetrixError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod metric;
pub mod protocol;
pub mod signer;

/// Shared result type.
pub use error::{Result, MetrixError};
pub use metric::{Metric, MetricKind, MetricValue};
pub use signer::{Signable, Signer};
