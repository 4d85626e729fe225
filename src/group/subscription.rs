//! Subscription normalization and snapshot delivery
//!
//! Topic lists handed to the coordinator are treated as sets: normalization
//! sorts lexicographically, drops duplicates and empty names. The group-wide
//! view is a [`MembershipSnapshot`], and [`Subscriptions`] is the caller-side
//! stream of those snapshots with latest-value semantics.

use std::collections::BTreeMap;
use tokio::sync::watch;

/// The normalized group-wide subscription map: member id to sorted topics.
///
/// `BTreeMap` keeps member iteration order deterministic and makes deep
/// equality the ordinary `==`.
pub type MembershipSnapshot = BTreeMap<String, Vec<String>>;

/// Normalize a topic list into its canonical form: lexicographically sorted,
/// unique, with empty names dropped. An empty result means "subscribed to
/// nothing".
pub fn normalize_topics(topics: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = topics.into_iter().filter(|t| !t.is_empty()).collect();
    normalized.sort_unstable();
    normalized.dedup();
    normalized
}

/// Stream of membership snapshots delivered to one caller.
///
/// The channel holds a single slot with latest-value semantics: if the caller
/// has not drained a prior snapshot when a newer one is produced, the newer
/// snapshot replaces it in place. The stream ends (returns `None`) once the
/// member handle is stopped or its session is lost.
#[derive(Debug)]
pub struct Subscriptions {
    rx: watch::Receiver<Option<MembershipSnapshot>>,
}

impl Subscriptions {
    pub(crate) fn new(rx: watch::Receiver<Option<MembershipSnapshot>>) -> Self {
        Self { rx }
    }

    /// Wait for the next snapshot. Returns `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<MembershipSnapshot> {
        loop {
            self.rx.changed().await.ok()?;
            // The slot starts out empty; skip until the first real snapshot.
            if let Some(snapshot) = self.rx.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }

    /// The most recently produced snapshot, if any, without waiting.
    pub fn latest(&self) -> Option<MembershipSnapshot> {
        self.rx.borrow().clone()
    }
}
