//! Membership reconciliation
//!
//! One reconciler task runs per group member. It folds three event sources
//! into a single debounced reconciliation pass:
//!
//! - local intents (the latest topic list handed to the member),
//! - one-shot child watches on the group's registrations,
//! - the rebalance timer, reset by every event.
//!
//! When the timer fires, the reconciler publishes its pending intent to the
//! member's ephemeral node (only if it differs from what is advertised),
//! re-reads the group-wide subscription map, and emits a snapshot only when
//! that map differs from the last one emitted. A storm of intents and watch
//! events inside one debounce window therefore produces at most one
//! notification, and an intent that round-trips back to the advertised value
//! produces none.

use crate::config::MAX_RECONCILE_FAILURES;
use crate::coordination::WatchEvent;
use crate::error::Result;
use crate::group::registry::GroupRegistry;
use crate::group::subscription::{normalize_topics, MembershipSnapshot};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub(crate) struct Reconciler {
    member_id: String,
    registry: GroupRegistry,
    rebalance_delay: Duration,

    intents: mpsc::Receiver<Vec<String>>,
    snapshots: watch::Sender<Option<MembershipSnapshot>>,
    stop: CancellationToken,

    /// Topics last written to our own registration node.
    advertised: Vec<String>,
    /// Normalized intent awaiting the next timer fire.
    pending: Option<Vec<String>>,
    /// Last snapshot handed to the caller.
    last_emitted: Option<MembershipSnapshot>,
    /// Debounce deadline; `None` while no reconciliation is scheduled.
    deadline: Option<Instant>,
    /// Currently installed one-shot child watch.
    child_watch: Option<oneshot::Receiver<WatchEvent>>,
    /// Consecutive reconciliation failures.
    failures: u32,
}

impl Reconciler {
    pub(crate) fn new(
        member_id: impl Into<String>,
        registry: GroupRegistry,
        rebalance_delay: Duration,
        intents: mpsc::Receiver<Vec<String>>,
        snapshots: watch::Sender<Option<MembershipSnapshot>>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            registry,
            rebalance_delay,
            intents,
            snapshots,
            stop,
            advertised: Vec::new(),
            pending: None,
            last_emitted: None,
            deadline: None,
            child_watch: None,
            failures: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(
            group = %self.registry.group(),
            member = %self.member_id,
            "reconciler started"
        );
        loop {
            let stop = self.stop.clone();
            let deadline = self.deadline;
            let intents = &mut self.intents;
            let child_watch = &mut self.child_watch;

            let event = tokio::select! {
                _ = stop.cancelled() => Step::Shutdown,
                intent = intents.recv() => match intent {
                    Some(topics) => Step::Intent(topics),
                    None => Step::Shutdown,
                },
                fired = watch_fired(child_watch) => Step::Watch(fired),
                _ = debounce_elapsed(deadline) => Step::Timer,
            };

            match event {
                Step::Intent(topics) => self.on_intent(topics),
                Step::Watch(event) => {
                    if !self.on_watch(event) {
                        return self.abandon();
                    }
                }
                Step::Timer => {
                    if !self.on_timer().await {
                        return self.abandon();
                    }
                }
                Step::Shutdown => break,
            }
        }
        self.shutdown().await;
    }

    fn on_intent(&mut self, topics: Vec<String>) {
        let normalized = normalize_topics(topics);
        if normalized == self.advertised {
            // A round-trip back to the advertised list cancels whatever was
            // pending. The timer is still armed at cold start so the first
            // reconciliation can emit the initial snapshot.
            self.pending = None;
            if self.last_emitted.is_none() {
                self.arm_timer();
            }
            return;
        }
        debug!(
            group = %self.registry.group(),
            member = %self.member_id,
            topics = ?normalized,
            "subscription intent received"
        );
        self.pending = Some(normalized);
        self.arm_timer();
    }

    /// Returns false when the session is gone and the reconciler must die.
    fn on_watch(&mut self, event: std::result::Result<WatchEvent, oneshot::error::RecvError>) -> bool {
        self.child_watch = None;
        match event {
            Ok(WatchEvent::ChildrenChanged) => {
                self.arm_timer();
                true
            }
            Ok(WatchEvent::SessionLost) => {
                error!(
                    group = %self.registry.group(),
                    member = %self.member_id,
                    "coordination session lost; stopping membership updates"
                );
                false
            }
            Err(_) => {
                // The service dropped the watch without firing it; the
                // session is not coming back for us.
                error!(
                    group = %self.registry.group(),
                    member = %self.member_id,
                    "watch channel closed by coordination service"
                );
                false
            }
        }
    }

    /// Returns false when the session is gone and the reconciler must die.
    async fn on_timer(&mut self) -> bool {
        self.deadline = None;
        match self.reconcile().await {
            Ok(()) => {
                self.failures = 0;
                true
            }
            Err(error) if error.is_session_lost() => {
                error!(
                    group = %self.registry.group(),
                    member = %self.member_id,
                    %error,
                    "coordination session lost during reconciliation"
                );
                false
            }
            Err(error) => {
                // Transient trouble: retry at the debounce cadence. The pace
                // is bounded by the rebalance delay, so this can neither
                // deadlock nor spin.
                self.failures += 1;
                if self.failures >= MAX_RECONCILE_FAILURES {
                    error!(
                        group = %self.registry.group(),
                        member = %self.member_id,
                        failures = self.failures,
                        %error,
                        "reconciliation keeps failing"
                    );
                } else {
                    warn!(
                        group = %self.registry.group(),
                        member = %self.member_id,
                        failures = self.failures,
                        %error,
                        "reconciliation failed; retrying"
                    );
                }
                self.arm_timer();
                true
            }
        }
    }

    async fn reconcile(&mut self) -> Result<()> {
        if let Some(pending) = self.pending.clone() {
            if pending.is_empty() {
                self.registry.unregister_member(&self.member_id).await?;
            } else {
                self.registry
                    .register_member(&self.member_id, &pending)
                    .await?;
            }
            info!(
                group = %self.registry.group(),
                member = %self.member_id,
                topics = ?pending,
                "registration updated"
            );
            self.advertised = pending;
            self.pending = None;
        }

        if self.advertised.is_empty() {
            // An unsubscribed member is not a consumer: it neither watches
            // the group nor reports membership until it subscribes again, at
            // which point the first snapshot is emitted afresh.
            self.last_emitted = None;
            return Ok(());
        }

        // Install the watch before reading so no registration change between
        // the read and the next pass can go unnoticed.
        if self.child_watch.is_none() {
            self.child_watch = Some(self.registry.watch_members().await?);
        }

        let snapshot = self.registry.fetch_subscriptions().await?;
        if self.last_emitted.as_ref() != Some(&snapshot) {
            debug!(
                group = %self.registry.group(),
                member = %self.member_id,
                members = snapshot.len(),
                "publishing membership snapshot"
            );
            self.snapshots.send_replace(Some(snapshot.clone()));
            self.last_emitted = Some(snapshot);
        }
        Ok(())
    }

    fn arm_timer(&mut self) {
        self.deadline = Some(Instant::now() + self.rebalance_delay);
    }

    /// Clean exit: drop the registration so the rest of the group rebalances
    /// without us, then close the snapshot stream.
    async fn shutdown(self) {
        if let Err(error) = self.registry.unregister_member(&self.member_id).await {
            debug!(
                group = %self.registry.group(),
                member = %self.member_id,
                %error,
                "could not remove registration during shutdown"
            );
        }
        info!(
            group = %self.registry.group(),
            member = %self.member_id,
            "reconciler stopped"
        );
        // Dropping `self.snapshots` closes the subscription stream.
    }

    /// Session-lost exit: the server already dropped our ephemeral state, so
    /// there is nothing to unregister. Closing the stream is the signal.
    fn abandon(self) {}
}

enum Step {
    Intent(Vec<String>),
    Watch(std::result::Result<WatchEvent, oneshot::error::RecvError>),
    Timer,
    Shutdown,
}

async fn watch_fired(
    watch: &mut Option<oneshot::Receiver<WatchEvent>>,
) -> std::result::Result<WatchEvent, oneshot::error::RecvError> {
    match watch.as_mut() {
        Some(rx) => rx.await,
        None => std::future::pending().await,
    }
}

async fn debounce_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
