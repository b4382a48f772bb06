//! HTTP transport.
//!
//! Decodes path segments and JSON bodies once into wire messages, maps
//! errors onto status codes and guards every route with the trusted subnet
//! check when one is configured.

pub mod codec;
pub mod error;
pub mod guard;
pub mod http;

pub use error::ApiError;
