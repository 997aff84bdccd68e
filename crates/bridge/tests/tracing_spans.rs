//! Integration test verifying that `#[instrument]` annotations produce the
//! expected spans for a bridge request.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use bookledger_bridge::{
    CallContext,
    testutil::{StubGateway, test_bridge},
};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer: records span names as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

fn collect() -> (SpanCollector, Arc<Mutex<Vec<String>>>) {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    (collector, spans)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_creates_pipeline_spans() {
    let (collector, spans) = collect();
    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let bridge = test_bridge(&StubGateway::new());
    let _ = bridge.query_book("B1", "L1", &CallContext::new()).await;

    let recorded = spans.lock().expect("lock poisoned");
    for name in ["execute", "open_session", "resolve", "dispatch"] {
        assert!(recorded.iter().any(|s| s == name), "expected a '{name}' span, got: {recorded:?}");
    }
}

#[tokio::test]
async fn missing_identity_stops_before_dispatch_span() {
    let (collector, spans) = collect();
    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let bridge = bookledger_bridge::LedgerBridge::new(
        bookledger_bridge::BridgeConfig::default(),
        Arc::new(bookledger_bridge::MemoryWallet::new()),
        Arc::new(StubGateway::new()),
    );
    let _ = bridge.query_book("B1", "L1", &CallContext::new()).await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "resolve"), "expected a 'resolve' span, got: {recorded:?}");
    assert!(
        !recorded.iter().any(|s| s == "dispatch"),
        "no 'dispatch' span expected, got: {recorded:?}"
    );
}
