//! Integration test verifying that `#[instrument]` annotations produce
//! the expected spans on challenge operations.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use chrono::{TimeDelta, Utc};
use pushauth_challenge::{
    ChallengeRepository, ChallengeStateMachine, ChallengeStatus, FactorKeys,
    MemoryChallengeRepository, PushAuthConfig, RemoteChallengeRepository, SyncedClock,
    testutil::{
        RecordingTransport, body_response, challenge_body, pending_challenge, push_factor,
        skew_rejection,
    },
};
use pushauth_keystore::{SecureKeyStore, testutil::memory_key_store};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer that records span names as they are created
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

fn recorded(spans: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    spans.lock().expect("lock poisoned").clone()
}

fn assert_span(recorded: &[String], name: &str) {
    assert!(recorded.iter().any(|s| s == name), "missing span {name}, got: {recorded:?}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn respond_creates_state_machine_and_key_store_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let key_store = memory_key_store();
    key_store.generate_key_pair("alias").expect("generate should succeed");
    let repository = MemoryChallengeRepository::new();
    repository.insert(pending_challenge("s1", "f1", &[("sid", "s1")]));
    let machine = ChallengeStateMachine::new(repository, key_store);

    machine
        .respond("s1", &push_factor("f1", "alias"), ChallengeStatus::Approved)
        .await
        .expect("respond should succeed");

    let recorded = recorded(&spans);
    assert_span(&recorded, "respond");
    assert_span(&recorded, "fetch");
    assert_span(&recorded, "sign");
}

#[tokio::test]
async fn remote_get_creates_repository_and_retry_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let transport = Arc::new(
        RecordingTransport::new()
            .with_response(skew_rejection(Utc::now() + TimeDelta::minutes(3)))
            .with_response(body_response(&challenge_body(&pending_challenge("s1", "f1", &[])), None)),
    );
    let config = PushAuthConfig::builder()
        .base_url("https://verify.example.com")
        .build()
        .expect("config should be valid");
    let repository = RemoteChallengeRepository::new(transport, &config, Arc::new(SyncedClock::new()));

    repository.get("s1", &push_factor("f1", "alias")).await.expect("get should succeed");

    let recorded = recorded(&spans);
    assert_span(&recorded, "get");
    assert_span(&recorded, "execute");
}

#[test]
fn factor_key_lifecycle_creates_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let keys = FactorKeys::new(memory_key_store(), "pushauth-");
    let pair = keys.create("f1").expect("create should succeed");
    let rotated = keys.rotate(&push_factor("f1", pair.alias())).expect("rotate should succeed");
    keys.delete(&rotated).expect("delete should succeed");

    let recorded = recorded(&spans);
    assert_span(&recorded, "create");
    assert_span(&recorded, "rotate");
    assert_span(&recorded, "delete");
    assert_span(&recorded, "generate_key_pair");
}
