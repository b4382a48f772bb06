#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;

use metrix_agent::collector::{Collector, MetricsProvider};
use metrix_agent::{config, Agent, Pusher};
use metrix_core::error::Result;
use metrix_core::protocol::Converter;
use metrix_core::{Metric, MetricKind, MetricValue, MetrixError, Signer};
use metrix_server::app_state::AppState;
use metrix_server::storage::{MemoryStorage, MetricsStorage};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Real metrix-server router over a memory backup; returns the state too so
/// tests can inspect what arrived.
async fn spawn_server(yaml: &str) -> (SocketAddr, AppState) {
    let cfg = metrix_server::config::load_from_str(yaml).unwrap();
    let state = AppState::with_backup(cfg, Arc::new(MemoryStorage::new())).unwrap();
    let addr = spawn(metrix_server::router::build_router(state.clone())).await;
    (addr, state)
}

async fn stored(state: &AppState, kind: MetricKind, name: &str) -> MetricValue {
    state.storage().get_metric(kind, name).await.unwrap().value()
}

#[tokio::test]
async fn acknowledged_counters_are_flushed() {
    let (addr, state) = spawn_server("version: 1\n").await;
    let pusher = Pusher::new(&addr.to_string(), Converter::default(), 100).unwrap();

    let c = Metric::counter("c", 100);
    let g = Metric::gauge("g", 1.5);
    pusher.push(&[c.clone(), g.clone()], TIMEOUT).await.unwrap();

    assert_eq!(c.value(), MetricValue::Counter(0));
    assert_eq!(g.value(), MetricValue::Gauge(1.5));
    assert_eq!(stored(&state, MetricKind::Counter, "c").await, MetricValue::Counter(100));
    assert_eq!(stored(&state, MetricKind::Gauge, "g").await, MetricValue::Gauge(1.5));
}

#[tokio::test]
async fn increments_during_push_survive_acknowledgement() {
    let stub = Router::new().route(
        "/updates",
        post(|| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            StatusCode::OK
        }),
    );
    let addr = spawn(stub).await;
    let pusher = Pusher::new(&addr.to_string(), Converter::default(), 100).unwrap();

    let c = Metric::counter("c", 100);
    let poller = {
        let c = c.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            c.set_value(MetricValue::Counter(5)).unwrap();
        })
    };
    pusher.push(&[c.clone()], TIMEOUT).await.unwrap();
    poller.await.unwrap();

    assert_eq!(c.value(), MetricValue::Counter(5));
}

#[tokio::test]
async fn server_error_keeps_counters() {
    let stub = Router::new().route(
        "/updates",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let addr = spawn(stub).await;
    let pusher = Pusher::new(&addr.to_string(), Converter::default(), 100).unwrap();

    let c = Metric::counter("c", 100);
    let err = pusher.push(&[c.clone()], TIMEOUT).await.unwrap_err();
    match err {
        MetrixError::UnexpectedStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(c.value(), MetricValue::Counter(100));
}

#[tokio::test]
async fn later_chunk_failure_keeps_earlier_progress() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let stub = Router::new().route(
        "/updates",
        post(move || {
            let seen = seen.clone();
            async move {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            }
        }),
    );
    let addr = spawn(stub).await;
    let pusher = Pusher::new(&addr.to_string(), Converter::default(), 1).unwrap();

    let a = Metric::counter("a", 1);
    let b = Metric::counter("b", 2);
    let err = pusher.push(&[a.clone(), b.clone()], TIMEOUT).await.unwrap_err();
    assert!(matches!(err, MetrixError::UnexpectedStatus { status: 503, .. }));
    assert_eq!(a.value(), MetricValue::Counter(0));
    assert_eq!(b.value(), MetricValue::Counter(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn slow_server_times_out_without_flushing() {
    let stub = Router::new().route(
        "/updates",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    );
    let addr = spawn(stub).await;
    let pusher = Pusher::new(&addr.to_string(), Converter::default(), 100).unwrap();

    let c = Metric::counter("c", 7);
    let err = pusher.push(&[c.clone()], Duration::from_millis(100)).await.unwrap_err();
    assert!(matches!(err, MetrixError::Transport(_)));
    assert_eq!(c.value(), MetricValue::Counter(7));
}

#[tokio::test]
async fn signed_push_and_key_mismatch() {
    let (addr, state) = spawn_server("version: 1\nsigning:\n  key: \"secret\"\n").await;

    let good = Pusher::new(&addr.to_string(), Converter::new(Signer::new("secret")), 10).unwrap();
    good.push(&[Metric::gauge("g", 2.0)], TIMEOUT).await.unwrap();
    assert_eq!(stored(&state, MetricKind::Gauge, "g").await, MetricValue::Gauge(2.0));

    let bad = Pusher::new(&addr.to_string(), Converter::new(Signer::new("wrong")), 10).unwrap();
    let c = Metric::counter("c", 3);
    let err = bad.push(&[c.clone()], TIMEOUT).await.unwrap_err();
    assert!(matches!(err, MetrixError::UnexpectedStatus { status: 400, .. }));
    assert_eq!(c.value(), MetricValue::Counter(3));
}

#[tokio::test]
async fn real_ip_header_passes_trusted_subnet() {
    let (addr, _state) = spawn_server("version: 1\nserver:\n  trusted_subnet: \"10.0.0.0/8\"\n").await;

    let anonymous = Pusher::new(&addr.to_string(), Converter::default(), 10).unwrap();
    let err = anonymous.push(&[Metric::gauge("g", 1.0)], TIMEOUT).await.unwrap_err();
    assert!(matches!(err, MetrixError::UnexpectedStatus { status: 403, .. }));

    let trusted = Pusher::new(&addr.to_string(), Converter::default(), 10)
        .unwrap()
        .with_real_ip("10.20.30.40");
    trusted.push(&[Metric::gauge("g", 1.0)], TIMEOUT).await.unwrap();
}

struct Ticker(Metric);

impl MetricsProvider for Ticker {
    fn name(&self) -> &'static str {
        "ticker"
    }
    fn update(&mut self) -> Result<()> {
        self.0.set_value(MetricValue::Counter(1)).map(|_| ())
    }
    fn metrics(&self) -> Vec<Metric> {
        vec![self.0.clone()]
    }
}

#[tokio::test]
async fn agent_loops_deliver_until_cancelled() {
    let (addr, state) = spawn_server("version: 1\n").await;
    let cfg = config::load_from_str(&format!(
        "version: 1\nagent:\n  server_url: \"{addr}\"\n  poll_interval_secs: 1\n  report_interval_secs: 1\n"
    ))
    .unwrap();

    let ticks = Metric::counter("Ticks", 0);
    let mut collector = Collector::new();
    collector.register(Box::new(Ticker(ticks.clone())));
    let agent = Agent::new(&cfg, collector).unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    let task = tokio::spawn(agent.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(2500)).await;
    cancel.cancel();
    task.await.unwrap();

    let delivered = match stored(&state, MetricKind::Counter, "Ticks").await {
        MetricValue::Counter(n) => n,
        other => panic!("unexpected {other:?}"),
    };
    assert!(delivered >= 1);
}
