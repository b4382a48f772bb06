//! Request admission policy.
//!
//! Compiles the configured trusted subnet into a matcher the transport guard
//! consults per request.

pub mod subnet;

pub use subnet::TrustedSubnet;
