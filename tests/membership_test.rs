//! Membership reconciliation tests
//!
//! End-to-end coverage of the debounced membership engine: normalization of
//! published topic lists, coalescing of rapid subscription changes, group-wide
//! convergence, unsubscription, and the session-loss error path. All members
//! in a test share one in-memory coordination service, exactly as production
//! members share one coordination-service session per process.

mod common;

use common::*;
use std::time::Duration;

/// A topic list pushed into `topics()` comes back as one membership snapshot
/// with the list normalized (sorted, deduplicated).
#[tokio::test(flavor = "multi_thread")]
async fn test_simple_subscribe() {
    let service = coordination();
    let mut m1 = spawn_member(&service, "m1");

    m1.topics().send(topics(&["foo", "bar"])).await.unwrap();

    let expected = membership(&[("m1", &["bar", "foo"])]);
    let seen = await_membership(&mut m1, &expected).await;
    assert_eq!(seen, 1, "expected exactly one snapshot");

    // Nothing else follows: the advertised state already matches.
    assert_no_snapshot(&mut m1).await;

    m1.stop().await;
}

/// Subscription changes in close succession coalesce into a single snapshot
/// carrying the most recent list.
#[tokio::test(flavor = "multi_thread")]
async fn test_subscribe_sequence_coalesces() {
    let service = coordination();
    let mut m1 = spawn_member(&service, "m1");

    m1.topics().send(topics(&["foo", "bar"])).await.unwrap();
    m1.topics().send(topics(&["blah", "bazz"])).await.unwrap();

    let expected = membership(&[("m1", &["bazz", "blah"])]);
    let seen = await_membership(&mut m1, &expected).await;
    assert_eq!(seen, 1, "intermediate list must never be published");

    m1.stop().await;
}

/// Re-sending the list a member already advertises updates nothing and
/// notifies nobody.
#[tokio::test(flavor = "multi_thread")]
async fn test_resubscribe_is_ignored() {
    let service = coordination();
    let mut m1 = spawn_member(&service, "m1");
    let mut m2 = spawn_member(&service, "m2");

    m1.topics().send(topics(&["foo", "bar"])).await.unwrap();
    m2.topics().send(topics(&["bazz", "bar"])).await.unwrap();

    let expected = membership(&[("m1", &["bar", "foo"]), ("m2", &["bar", "bazz"])]);
    await_membership(&mut m1, &expected).await;
    await_membership(&mut m2, &expected).await;

    m1.topics().send(topics(&["foo", "bar"])).await.unwrap();

    assert_no_snapshot(&mut m1).await;
    assert_no_snapshot(&mut m2).await;

    m1.stop().await;
    m2.stop().await;
}

/// A rapid change-and-change-back inside the debounce window leaves the
/// advertised subscription untouched, so no member sees anything.
#[tokio::test(flavor = "multi_thread")]
async fn test_redundant_update_is_ignored() {
    let service = coordination();
    let mut m1 = spawn_member(&service, "m1");
    let mut m2 = spawn_member(&service, "m2");

    m1.topics().send(topics(&["foo", "bar"])).await.unwrap();
    m2.topics()
        .send(topics(&["foo", "bazz", "blah"]))
        .await
        .unwrap();

    let expected = membership(&[("m1", &["bar", "foo"]), ("m2", &["bazz", "blah", "foo"])]);
    await_membership(&mut m1, &expected).await;
    await_membership(&mut m2, &expected).await;

    m2.topics().send(topics(&["bar"])).await.unwrap();
    m2.topics()
        .send(topics(&["foo", "bazz", "blah"]))
        .await
        .unwrap();

    assert_no_snapshot(&mut m1).await;
    assert_no_snapshot(&mut m2).await;

    m1.stop().await;
    m2.stop().await;
}

/// Several members subscribing to one group all converge on the identical
/// membership map covering everyone.
#[tokio::test(flavor = "multi_thread")]
async fn test_membership_changes_converge() {
    let service = coordination();
    let mut m1 = spawn_member(&service, "m1");
    let mut m2 = spawn_member(&service, "m2");
    let mut m3 = spawn_member(&service, "m3");

    m1.topics().send(topics(&["foo", "bar"])).await.unwrap();
    m2.topics().send(topics(&["foo"])).await.unwrap();
    m3.topics()
        .send(topics(&["foo", "bazz", "blah"]))
        .await
        .unwrap();

    let expected = membership(&[
        ("m1", &["bar", "foo"]),
        ("m2", &["foo"]),
        ("m3", &["bazz", "blah", "foo"]),
    ]);
    await_membership(&mut m1, &expected).await;
    await_membership(&mut m2, &expected).await;
    await_membership(&mut m3, &expected).await;

    m1.stop().await;
    m2.stop().await;
    m3.stop().await;
}

/// An empty topic list unsubscribes from everything: the registration node
/// disappears, the remaining members rebalance, and the unsubscribed member
/// itself goes quiet.
#[tokio::test(flavor = "multi_thread")]
async fn test_unsubscribe_with_empty_list() {
    let service = coordination();
    let mut m1 = spawn_member(&service, "m1");
    let mut m2 = spawn_member(&service, "m2");

    m1.topics().send(topics(&["foo", "bar"])).await.unwrap();
    m2.topics().send(topics(&["foo"])).await.unwrap();

    let expected = membership(&[("m1", &["bar", "foo"]), ("m2", &["foo"])]);
    await_membership(&mut m1, &expected).await;
    await_membership(&mut m2, &expected).await;

    m1.topics().send(vec![]).await.unwrap();

    await_membership(&mut m2, &membership(&[("m2", &["foo"])])).await;
    assert_no_snapshot(&mut m1).await;

    m1.stop().await;
    m2.stop().await;
}

/// A member that unsubscribed and then resubscribes rejoins the group and
/// receives the membership map again.
#[tokio::test(flavor = "multi_thread")]
async fn test_resubscribe_after_unsubscribe() {
    let service = coordination();
    let mut m1 = spawn_member(&service, "m1");
    let mut m2 = spawn_member(&service, "m2");

    m1.topics().send(topics(&["foo"])).await.unwrap();
    m2.topics().send(topics(&["foo"])).await.unwrap();

    let both = membership(&[("m1", &["foo"]), ("m2", &["foo"])]);
    await_membership(&mut m1, &both).await;
    await_membership(&mut m2, &both).await;

    m1.topics().send(vec![]).await.unwrap();
    await_membership(&mut m2, &membership(&[("m2", &["foo"])])).await;

    m1.topics().send(topics(&["foo"])).await.unwrap();
    await_membership(&mut m1, &both).await;
    await_membership(&mut m2, &both).await;

    m1.stop().await;
    m2.stop().await;
}

/// Stopping a member removes its registration and closes its subscription
/// stream; the rest of the group rebalances.
#[tokio::test(flavor = "multi_thread")]
async fn test_stop_unregisters_member() {
    let service = coordination();
    let mut m1 = spawn_member(&service, "m1");
    let mut m2 = spawn_member(&service, "m2");

    m1.topics().send(topics(&["foo"])).await.unwrap();
    m2.topics().send(topics(&["bar"])).await.unwrap();

    let both = membership(&[("m1", &["foo"]), ("m2", &["bar"])]);
    await_membership(&mut m1, &both).await;
    await_membership(&mut m2, &both).await;

    m1.stop().await;
    // Idempotent.
    m1.stop().await;

    await_membership(&mut m2, &membership(&[("m2", &["bar"])])).await;
    await_stream_closed(&mut m1).await;

    m2.stop().await;
}

/// Losing the coordination session is fatal for the handle: the stream
/// closes and no further snapshots are published.
#[tokio::test(flavor = "multi_thread")]
async fn test_session_loss_closes_stream() {
    let service = coordination();
    let mut m1 = spawn_member(&service, "m1");

    m1.topics().send(topics(&["foo"])).await.unwrap();
    await_membership(&mut m1, &membership(&[("m1", &["foo"])])).await;

    service.expire_session();

    await_stream_closed(&mut m1).await;
    m1.stop().await;
}

/// Intents queued faster than the debounce window still resolve to the last
/// one sent: the latest intent wins.
#[tokio::test(flavor = "multi_thread")]
async fn test_latest_intent_wins() {
    let service = coordination();
    let mut m1 = spawn_member(&service, "m1");

    for round in 0..5u32 {
        m1.topics().send(vec![format!("t{round}")]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    await_membership(&mut m1, &membership(&[("m1", &["t4"])])).await;

    m1.stop().await;
}
