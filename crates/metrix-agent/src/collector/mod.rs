//! Metric providers.
//!
//! A provider owns long-lived [`Metric`] handles and refreshes them on
//! [`update`](MetricsProvider::update). The pusher works on the same handles,
//! so a flush after an acknowledged push resets the very cells the providers
//! keep adding to.

pub mod runtime;
pub mod system;

use metrix_core::error::Result;
use metrix_core::Metric;
use tracing::warn;

pub use runtime::RuntimeProvider;
pub use system::SystemProvider;

pub trait MetricsProvider: Send {
    fn name(&self) -> &'static str;

    /// Refresh every metric this provider owns.
    fn update(&mut self) -> Result<()>;

    /// Handles to every metric this provider owns.
    fn metrics(&self) -> Vec<Metric>;
}

/// The set of providers the agent polls.
#[derive(Default)]
pub struct Collector {
    providers: Vec<Box<dyn MetricsProvider>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime and system providers.
    pub fn standard() -> Self {
        let mut c = Self::new();
        c.register(Box::new(RuntimeProvider::new()));
        c.register(Box::new(SystemProvider::new()));
        c
    }

    pub fn register(&mut self, provider: Box<dyn MetricsProvider>) {
        self.providers.push(provider);
    }

    /// Update every provider. One failing provider does not stop the others.
    pub fn update_all(&mut self) {
        for p in &mut self.providers {
            if let Err(e) = p.update() {
                warn!(provider = p.name(), error = %e, "metrics update failed");
            }
        }
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.providers.iter().flat_map(|p| p.metrics()).collect()
    }
}
