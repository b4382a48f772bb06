//! Periodic collect and push loops.
//!
//! Both loops stop when the cancellation token fires. The token is only
//! observed between cycles, so an update or push already running completes
//! first.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use metrix_core::error::Result;
use metrix_core::protocol::Converter;

use crate::collector::Collector;
use crate::config::AgentConfig;
use crate::pusher::Pusher;

pub type SharedCollector = Arc<Mutex<Collector>>;

pub async fn run_collect_loop(collector: SharedCollector, period: Duration, cancel: CancellationToken) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {}
        }
        collector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update_all();
    }
    debug!("collect loop stopped");
}

pub async fn run_push_loop(
    collector: SharedCollector,
    pusher: Arc<Pusher>,
    period: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately; wait a full period before pushing
    tick.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {}
        }
        let metrics = collector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .metrics();
        match pusher.push(&metrics, timeout).await {
            Ok(()) => debug!(count = metrics.len(), "metrics pushed"),
            Err(e) => warn!(error = %e, "push failed, unacknowledged counters kept"),
        }
    }
    debug!("push loop stopped");
}

pub struct Agent {
    collector: SharedCollector,
    pusher: Arc<Pusher>,
    poll_interval: Duration,
    report_interval: Duration,
    push_timeout: Duration,
}

impl Agent {
    pub fn new(cfg: &AgentConfig, collector: Collector) -> Result<Self> {
        let converter = Converter::new(cfg.signing.signer());
        let mut pusher = Pusher::new(&cfg.agent.server_url, converter, cfg.agent.batch_size)?;
        if let Some(ip) = &cfg.agent.real_ip {
            pusher = pusher.with_real_ip(ip.clone());
        }
        Ok(Self {
            collector: Arc::new(Mutex::new(collector)),
            pusher: Arc::new(pusher),
            poll_interval: cfg.agent.poll_interval(),
            report_interval: cfg.agent.report_interval(),
            push_timeout: cfg.agent.push_timeout(),
        })
    }

    pub fn collector(&self) -> &SharedCollector {
        &self.collector
    }

    /// Run both loops until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            url = self.pusher.url(),
            poll = ?self.poll_interval,
            report = ?self.report_interval,
            "metrix-agent running"
        );
        tokio::join!(
            run_collect_loop(self.collector.clone(), self.poll_interval, cancel.clone()),
            run_push_loop(
                self.collector,
                self.pusher,
                self.report_interval,
                self.push_timeout,
                cancel,
            ),
        );
    }
}
