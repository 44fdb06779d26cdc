//! Integration tests for the Lancea engine
//!
//! These drive a full [`Engine`] with fake providers and observe it only
//! through its push events and return values.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FakeProvider, Script, collect_until, delivered_keys, ended};
use lancea::config::EngineConfig;
use lancea::engine::Engine;
use lancea::events::EngineEvent;
use lancea::resolver::{CommandRegistry, CommandSpec};
use lancea_model::Epoch;

const WAIT: Duration = Duration::from_secs(5);

fn engine_with(providers: Vec<FakeProvider>) -> Engine {
    let mut builder = Engine::builder(EngineConfig::default()).without_builtin_providers();
    for provider in providers {
        builder = builder.provider(Arc::new(provider));
    }
    builder.build()
}

// =============================================================================
// Epochs
// =============================================================================

#[tokio::test]
async fn test_epoch_strictly_increases_across_new_searches() {
    let engine = engine_with(vec![FakeProvider::new("echo", Script::Echo)]);

    let mut last = Epoch::NONE;
    for i in 0..20 {
        let requested = if i % 2 == 0 { Epoch::NONE } else { Epoch(last.0 + 100) };
        let epoch = engine.search("x", &[], requested);
        assert!(epoch > last, "{} should be greater than {}", epoch, last);
        last = epoch;
    }
    assert_eq!(engine.current_epoch(), last);
}

#[tokio::test]
async fn test_no_stale_results_after_newer_search_returns() {
    let engine = engine_with(vec![FakeProvider::new("slow", Script::Delayed(100, vec!["hit"]))]);
    let mut rx = engine.subscribe();

    let old = engine.search("first", &[], Epoch::NONE);
    let new = engine.search("second", &[], Epoch::NONE);
    assert!(new > old);

    let events = collect_until(&mut rx, WAIT, |evs| ended(evs, new, "slow")).await;
    // Give the superseded unit time to finish its sleep
    let late = collect_until(&mut rx, Duration::from_millis(250), |_| false).await;

    for event in events.iter().chain(late.iter()) {
        assert_eq!(event.epoch(), new, "stale event leaked: {:?}", event);
    }
}

// =============================================================================
// Tokens
// =============================================================================

#[tokio::test]
async fn test_tokens_are_one_two_three_per_provider() {
    let engine = engine_with(vec![
        FakeProvider::new("a", Script::Echo),
        FakeProvider::new("b", Script::Delayed(10, vec!["b1", "b2"])),
    ]);
    let mut rx = engine.subscribe();

    let epoch = engine.search("q", &[], Epoch::NONE);
    let events = collect_until(&mut rx, WAIT, |evs| ended(evs, epoch, "a") && ended(evs, epoch, "b")).await;

    for provider in ["a", "b"] {
        let tokens: Vec<u64> = events
            .iter()
            .filter(|e| e.provider_id() == provider)
            .filter_map(EngineEvent::token)
            .collect();
        assert_eq!(tokens, vec![1, 2], "provider {}", provider);
    }
}

#[tokio::test]
async fn test_reused_epoch_continues_tokens() {
    let engine = engine_with(vec![FakeProvider::new("echo", Script::Echo)]);
    let mut rx = engine.subscribe();

    let epoch = engine.search("one", &[], Epoch::NONE);
    collect_until(&mut rx, WAIT, |evs| ended(evs, epoch, "echo")).await;

    let again = engine.search("two", &[], epoch);
    assert_eq!(again, epoch);
    let events = collect_until(&mut rx, WAIT, |evs| ended(evs, epoch, "echo")).await;

    let tokens: Vec<u64> = events.iter().filter_map(EngineEvent::token).collect();
    assert_eq!(tokens, vec![3, 4]);
}

// =============================================================================
// Supersession and failure
// =============================================================================

#[tokio::test]
async fn test_slow_provider_superseded_by_new_epoch() {
    let engine = engine_with(vec![
        FakeProvider::new("slow", Script::Delayed(200, vec!["s"])),
        FakeProvider::new("fast", Script::Delayed(0, vec!["f"])),
    ]);
    let mut rx = engine.subscribe();

    let first = engine.search("a", &[], Epoch::NONE);
    let mut events = collect_until(&mut rx, WAIT, |evs| ended(evs, first, "fast")).await;
    assert_eq!(delivered_keys(&events, first, "fast"), vec!["f"]);

    let second = engine.search("ab", &[], Epoch::NONE);
    events.extend(collect_until(&mut rx, WAIT, |evs| ended(evs, second, "slow") && ended(evs, second, "fast")).await);

    assert!(delivered_keys(&events, first, "slow").is_empty());
    assert_eq!(delivered_keys(&events, second, "slow"), vec!["s"]);
    assert_eq!(delivered_keys(&events, second, "fast"), vec!["f"]);
}

#[tokio::test]
async fn test_failed_first_batch_still_delivers_second() {
    let engine = engine_with(vec![
        FakeProvider::new("flaky", Script::ErrorThen(vec!["ok"])),
        FakeProvider::new("steady", Script::Echo),
    ]);
    let mut rx = engine.subscribe();

    let epoch = engine.search("q", &[], Epoch::NONE);
    let events = collect_until(&mut rx, WAIT, |evs| ended(evs, epoch, "flaky") && ended(evs, epoch, "steady")).await;

    let errors: Vec<&EngineEvent> = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::ProviderError { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].provider_id(), "flaky");
    assert_eq!(delivered_keys(&events, epoch, "flaky"), vec!["ok"]);
    assert_eq!(delivered_keys(&events, epoch, "steady"), vec!["steady:q"]);
}

// =============================================================================
// Resolver
// =============================================================================

#[test]
fn test_resolve_empty_without_wildcard() {
    let engine = Engine::builder(EngineConfig::default()).build();
    assert!(engine.resolve_command("").is_empty());
    assert!(engine.resolve_command("   ").is_empty());
}

#[test]
fn test_resolve_wildcard_catches_everything_else() {
    let mut commands = CommandRegistry::with_builtins();
    commands.register(CommandSpec::new("apps", "apps").with_aliases(["*"]));
    let engine = Engine::builder(EngineConfig::default()).commands(commands).build();

    let resolved = engine.resolve_command("");
    assert!(resolved.matched);
    assert_eq!(resolved.reason.as_deref(), Some("wildcard"));

    let resolved = engine.resolve_command("/cmd emoji");
    assert_eq!(resolved.reason.as_deref(), Some("slash-command"));
    assert_eq!(resolved.argument.as_deref(), Some("emoji"));
}

// =============================================================================
// Preview and execute
// =============================================================================

#[tokio::test]
async fn test_execute_twice_runs_twice() {
    let provider = Arc::new(FakeProvider::new("p", Script::Delayed(0, vec!["k"])));
    let engine = Engine::builder(EngineConfig::default())
        .without_builtin_providers()
        .provider(provider.clone())
        .build();
    let mut rx = engine.subscribe();

    let epoch = engine.search("", &[], Epoch::NONE);
    collect_until(&mut rx, WAIT, |evs| ended(evs, epoch, "p")).await;

    let first = engine.execute("p", "run", "k").await;
    let second = engine.execute("p", "run", "k").await;
    assert!(first.is_ok() && second.is_ok());
    assert_eq!(first.data.unwrap()["count"], 1);
    assert_eq!(second.data.unwrap()["count"], 2);
    assert_eq!(provider.executions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_previews_each_yield_one_event() {
    let engine = engine_with(vec![
        FakeProvider::new("p", Script::Delayed(0, vec!["a", "b", "c"])).with_preview_delay(20),
    ]);
    let mut rx = engine.subscribe();

    let epoch = engine.search("", &[], Epoch::NONE);
    collect_until(&mut rx, WAIT, |evs| ended(evs, epoch, "p")).await;

    for key in ["a", "b", "c"] {
        assert_eq!(engine.request_preview("p", key, Epoch::NONE), epoch);
    }

    let previews = |evs: &[EngineEvent]| {
        evs.iter()
            .filter(|e| matches!(e, EngineEvent::PreviewUpdated { .. }))
            .count()
    };
    let events = collect_until(&mut rx, WAIT, |evs| previews(evs) >= 3).await;
    // Nothing further should trail in
    let extra = collect_until(&mut rx, Duration::from_millis(100), |_| false).await;
    assert_eq!(previews(&extra), 0);

    let mut seen = HashSet::new();
    for event in &events {
        if let EngineEvent::PreviewUpdated {
            epoch: ev, key, preview, ..
        } = event
        {
            assert_eq!(*ev, epoch);
            assert_eq!(preview.data.data["key"], key.as_str());
            assert!(seen.insert(key.clone()), "duplicate preview for {}", key);
        }
    }
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn test_preview_unknown_key_reports_stale_key() {
    let engine = engine_with(vec![FakeProvider::new("p", Script::Delayed(0, vec!["a"]))]);
    let mut rx = engine.subscribe();

    let epoch = engine.search("", &[], Epoch::NONE);
    collect_until(&mut rx, WAIT, |evs| ended(evs, epoch, "p")).await;

    engine.request_preview("p", "missing", Epoch::NONE);
    let events = collect_until(&mut rx, WAIT, |evs| !evs.is_empty()).await;
    match &events[0] {
        EngineEvent::ProviderError { epoch: ev, error, .. } => {
            assert_eq!(*ev, epoch);
            assert_eq!(error.data.code, "stale-key");
        }
        other => panic!("Expected ProviderError, got {:?}", other),
    }
}
