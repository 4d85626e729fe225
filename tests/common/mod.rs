//! Shared fixtures for groupline integration tests
//!
//! In your test file, add:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use groupline::{CoordinatorConfig, GroupMember, MembershipSnapshot, MemoryCoordination};
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Debounce window used by timing-sensitive tests.
pub const REBALANCE_DELAY_MS: u64 = 200;

/// How long a "nothing arrives" assertion observes the stream: 1.5x the
/// debounce window, so a wrongly scheduled reconciliation would be caught.
pub const QUIET_WINDOW: Duration = Duration::from_millis(REBALANCE_DELAY_MS * 3 / 2);

/// Upper bound for "eventually" assertions.
pub const CONVERGE_TIMEOUT: Duration = Duration::from_secs(5);

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fresh in-memory coordination service shared by the members of one test.
pub fn coordination() -> Arc<MemoryCoordination> {
    init_tracing();
    Arc::new(MemoryCoordination::new())
}

pub fn test_config(rebalance_delay_ms: u64) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::default();
    config.rebalance_delay_ms = rebalance_delay_ms;
    config
}

/// Spawn a member of `gl_test` against the shared service.
pub fn spawn_member(service: &Arc<MemoryCoordination>, member_id: &str) -> GroupMember {
    let config = test_config(REBALANCE_DELAY_MS);
    GroupMember::spawn("gl_test", member_id, &config, service.clone())
}

pub fn topics(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Build the expected membership map from `(member, topics)` pairs.
pub fn membership(entries: &[(&str, &[&str])]) -> MembershipSnapshot {
    entries
        .iter()
        .map(|(member, names)| (member.to_string(), topics(names)))
        .collect()
}

/// Drain snapshots until `expected` arrives. Panics if the stream closes or
/// the timeout elapses first; returns the number of snapshots drained.
pub async fn await_membership(
    member: &mut GroupMember,
    expected: &MembershipSnapshot,
) -> usize {
    let mut seen = 0;
    let wait = async {
        loop {
            match member.subscriptions().recv().await {
                Some(snapshot) => {
                    seen += 1;
                    if snapshot == *expected {
                        return;
                    }
                }
                None => panic!("subscription stream closed before {expected:?} arrived"),
            }
        }
    };
    if tokio::time::timeout(CONVERGE_TIMEOUT, wait).await.is_err() {
        panic!(
            "timed out waiting for membership {expected:?} (latest: {:?})",
            member.subscriptions().latest()
        );
    }
    seen
}

/// Assert that no snapshot at all arrives within the quiet window.
pub async fn assert_no_snapshot(member: &mut GroupMember) {
    let outcome = tokio::time::timeout(QUIET_WINDOW, member.subscriptions().recv()).await;
    if let Ok(update) = outcome {
        panic!("unexpected subscription update: {update:?}");
    }
}

/// Assert that the stream closes (returns `None`) within the converge
/// timeout, draining any snapshots still in flight.
pub async fn await_stream_closed(member: &mut GroupMember) {
    let wait = async {
        while member.subscriptions().recv().await.is_some() {}
    };
    if tokio::time::timeout(CONVERGE_TIMEOUT, wait).await.is_err() {
        panic!("subscription stream did not close");
    }
}
