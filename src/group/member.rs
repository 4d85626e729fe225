//! Group member handle
//!
//! [`GroupMember::spawn`] wires the pieces together: it starts the
//! reconciler task, connects the intent and snapshot channels, and hands the
//! caller a single handle carrying the whole public surface: topic intents,
//! the subscription stream, partition claims, and a clean idempotent stop.

use crate::config::{CoordinatorConfig, DEFAULT_INTENT_QUEUE_DEPTH};
use crate::coordination::CoordinationClient;
use crate::error::{GrouplineError, Result};
use crate::group::claims::{ClaimHandle, PartitionClaimant};
use crate::group::reconciler::Reconciler;
use crate::group::registry::GroupRegistry;
use crate::group::subscription::Subscriptions;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One member of a consumer group.
///
/// The handle owns a background reconciler task. Topic lists pushed through
/// [`GroupMember::topics`] are debounced and advertised to the group;
/// coalesced membership snapshots arrive on [`GroupMember::subscriptions`].
/// Partition ownership is mechanised by [`GroupMember::claim_partition`].
///
/// # Example
///
/// ```rust,no_run
/// use groupline::{CoordinatorConfig, GroupMember, MemoryCoordination};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let service = Arc::new(MemoryCoordination::new());
/// let config = CoordinatorConfig::default();
/// let mut member = GroupMember::spawn("analytics", "m1", &config, service);
///
/// member
///     .topics()
///     .send(vec!["clicks".to_string(), "views".to_string()])
///     .await
///     .unwrap();
///
/// if let Some(snapshot) = member.subscriptions().recv().await {
///     println!("group membership: {snapshot:?}");
/// }
///
/// member.stop().await;
/// # }
/// ```
pub struct GroupMember {
    member_id: String,
    registry: GroupRegistry,
    topics_tx: mpsc::Sender<Vec<String>>,
    subscriptions: Subscriptions,
    claimant: PartitionClaimant,
    stop: CancellationToken,
    reconciler: Option<JoinHandle<()>>,
}

impl GroupMember {
    /// Spawn the member's reconciler task and return the handle.
    pub fn spawn(
        group: &str,
        member_id: &str,
        config: &CoordinatorConfig,
        client: Arc<dyn CoordinationClient>,
    ) -> Self {
        let registry = GroupRegistry::new(group, client);
        let (topics_tx, topics_rx) = mpsc::channel(DEFAULT_INTENT_QUEUE_DEPTH);
        let (snapshots_tx, snapshots_rx) = watch::channel(None);
        let stop = CancellationToken::new();

        let reconciler = Reconciler::new(
            member_id,
            registry.clone(),
            config.rebalance_delay(),
            topics_rx,
            snapshots_tx,
            stop.clone(),
        );
        let task = tokio::spawn(reconciler.run());

        info!(group = %group, member = %member_id, "group member spawned");

        Self {
            member_id: member_id.to_string(),
            claimant: PartitionClaimant::new(member_id, registry.clone()),
            registry,
            topics_tx,
            subscriptions: Subscriptions::new(snapshots_rx),
            stop,
            reconciler: Some(task),
        }
    }

    /// This member's id within the group.
    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// The group this member belongs to.
    pub fn group(&self) -> &str {
        self.registry.group()
    }

    /// Sender for subscription intents. Order and duplicates inside a list
    /// are irrelevant; an empty list unsubscribes from everything. Sends
    /// after [`GroupMember::stop`] are dropped.
    pub fn topics(&self) -> mpsc::Sender<Vec<String>> {
        self.topics_tx.clone()
    }

    /// Stream of coalesced membership snapshots. Closed once the member is
    /// stopped or the coordination session is lost.
    pub fn subscriptions(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }

    /// Claim exclusive ownership of `(topic, partition)`, blocking while
    /// another member holds it. Cancelling `cancel` aborts the wait and
    /// yields a handle that owns nothing.
    pub async fn claim_partition(
        &self,
        topic: &str,
        partition: i32,
        cancel: &CancellationToken,
    ) -> Result<ClaimHandle> {
        if self.reconciler.is_none() {
            return Err(GrouplineError::Stopped);
        }
        self.claimant.claim(topic, partition, cancel).await
    }

    /// The member currently owning `(topic, partition)`, if any.
    pub async fn partition_owner(&self, topic: &str, partition: i32) -> Result<Option<String>> {
        if self.reconciler.is_none() {
            return Err(GrouplineError::Stopped);
        }
        self.registry.partition_owner(topic, partition).await
    }

    /// Stop the member: terminate the reconciler, drop the group
    /// registration, release outstanding claims, and close the subscription
    /// stream. Idempotent; returns once everything is down.
    pub async fn stop(&mut self) {
        let Some(task) = self.reconciler.take() else {
            return;
        };
        self.stop.cancel();
        // The reconciler unregisters and closes the stream on its way out; a
        // panicked task has nothing left to wait for.
        let _ = task.await;
        self.claimant.release_all().await;
        info!(
            group = %self.registry.group(),
            member = %self.member_id,
            "group member stopped"
        );
    }
}

impl Drop for GroupMember {
    fn drop(&mut self) {
        // Best effort for handles dropped without an explicit stop: the
        // reconciler notices the cancellation and cleans itself up.
        self.stop.cancel();
    }
}

impl std::fmt::Debug for GroupMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupMember")
            .field("group", &self.registry.group())
            .field("member_id", &self.member_id)
            .field("stopped", &self.reconciler.is_none())
            .finish()
    }
}
