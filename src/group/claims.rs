//! Refcounted partition claims
//!
//! A claim is an in-process handle to an ephemeral owner node. The first
//! successful claim of `(topic, partition)` creates the node; further claims
//! by the same member only bump a local refcount, and the node is deleted
//! when the count returns to zero. A blocked claim waits for the owner to
//! release (via a one-shot watch on the topic's owners directory) or for the
//! caller's cancellation token, whichever comes first.

use crate::coordination::WatchEvent;
use crate::error::{CoordinationError, Result};
use crate::group::registry::GroupRegistry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type PartitionKey = (String, i32);

/// Refcounted claim registry for one group member.
#[derive(Clone)]
pub(crate) struct PartitionClaimant {
    inner: Arc<ClaimantInner>,
}

struct ClaimantInner {
    member_id: String,
    registry: GroupRegistry,
    /// Live in-process claims: partition -> refcount.
    refcounts: Mutex<HashMap<PartitionKey, usize>>,
    /// Per-partition gates serializing local waiters. The gate queue is FIFO,
    /// so only the head waiter races on the remote create; the rest refcount.
    gates: DashMap<PartitionKey, Arc<AsyncMutex<()>>>,
}

impl PartitionClaimant {
    pub(crate) fn new(member_id: impl Into<String>, registry: GroupRegistry) -> Self {
        Self {
            inner: Arc::new(ClaimantInner {
                member_id: member_id.into(),
                registry,
                refcounts: Mutex::new(HashMap::new()),
                gates: DashMap::new(),
            }),
        }
    }

    /// Claim `(topic, partition)`, blocking while another member owns it.
    ///
    /// Cancellation returns a handle that owns nothing; the partition stays
    /// with whoever held it. Session loss is surfaced as an error.
    pub(crate) async fn claim(
        &self,
        topic: &str,
        partition: i32,
        cancel: &CancellationToken,
    ) -> Result<ClaimHandle> {
        let key = (topic.to_string(), partition);
        let gate = self
            .inner
            .gates
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();

        // Cancellation only applies while the claim is blocked; an
        // uncontended claim proceeds even with an already-cancelled token.
        let _gate = match gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(
                        group = %self.inner.registry.group(),
                        member = %self.inner.member_id,
                        topic, partition,
                        "claim cancelled while queued locally"
                    );
                    return Ok(self.handle(&key, false));
                }
                guard = gate.lock() => guard,
            },
        };

        {
            let mut refcounts = self.inner.refcounts.lock();
            if let Some(count) = refcounts.get_mut(&key) {
                *count += 1;
                debug!(
                    group = %self.inner.registry.group(),
                    member = %self.inner.member_id,
                    topic, partition,
                    refcount = *count,
                    "partition already claimed; refcount bumped"
                );
                return Ok(self.handle(&key, true));
            }
        }

        loop {
            // Watch first, then try to create: a release landing between the
            // two is observed by the next create attempt, never missed.
            let watch = self.inner.registry.watch_owners(topic).await?;
            if self
                .inner
                .registry
                .claim_partition(&self.inner.member_id, topic, partition)
                .await?
            {
                self.inner.refcounts.lock().insert(key.clone(), 1);
                info!(
                    group = %self.inner.registry.group(),
                    member = %self.inner.member_id,
                    topic, partition,
                    "partition claimed"
                );
                return Ok(self.handle(&key, true));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(
                        group = %self.inner.registry.group(),
                        member = %self.inner.member_id,
                        topic, partition,
                        "claim cancelled while contended"
                    );
                    return Ok(self.handle(&key, false));
                }
                fired = watch => match fired {
                    Ok(WatchEvent::ChildrenChanged) => continue,
                    Ok(WatchEvent::SessionLost) => {
                        return Err(CoordinationError::SessionLost.into());
                    }
                    Err(_) => {
                        return Err(CoordinationError::unavailable(
                            "owner watch dropped by coordination service",
                        )
                        .into());
                    }
                },
            }
        }
    }

    fn handle(&self, key: &PartitionKey, owned: bool) -> ClaimHandle {
        ClaimHandle {
            claimant: self.clone(),
            topic: key.0.clone(),
            partition: key.1,
            owned,
        }
    }

    async fn release_one(&self, topic: &str, partition: i32) {
        let key = (topic.to_string(), partition);
        let fully_released = {
            let mut refcounts = self.inner.refcounts.lock();
            match refcounts.get_mut(&key) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    debug!(
                        group = %self.inner.registry.group(),
                        member = %self.inner.member_id,
                        topic, partition,
                        refcount = *count,
                        "claim handle released; partition still held"
                    );
                    false
                }
                Some(_) => {
                    refcounts.remove(&key);
                    true
                }
                // Already dropped by release_all during stop.
                None => false,
            }
        };
        if fully_released {
            if let Err(error) = self.inner.registry.release_partition(topic, partition).await {
                warn!(
                    group = %self.inner.registry.group(),
                    member = %self.inner.member_id,
                    topic, partition,
                    %error,
                    "could not delete owner node on release"
                );
            } else {
                info!(
                    group = %self.inner.registry.group(),
                    member = %self.inner.member_id,
                    topic, partition,
                    "partition released"
                );
            }
        }
    }

    /// Release every outstanding claim, regardless of refcounts. Used by
    /// handle stop.
    pub(crate) async fn release_all(&self) {
        let held: Vec<PartitionKey> = {
            let mut refcounts = self.inner.refcounts.lock();
            refcounts.drain().map(|(key, _)| key).collect()
        };
        for (topic, partition) in held {
            if let Err(error) = self
                .inner
                .registry
                .release_partition(&topic, partition)
                .await
            {
                warn!(
                    group = %self.inner.registry.group(),
                    member = %self.inner.member_id,
                    topic = %topic,
                    partition,
                    %error,
                    "could not delete owner node during stop"
                );
            }
        }
    }
}

/// Handle to one claim of `(topic, partition)`.
///
/// Dropping the handle without calling [`ClaimHandle::release`] leaks the
/// refcount until the member is stopped; release explicitly.
pub struct ClaimHandle {
    claimant: PartitionClaimant,
    topic: String,
    partition: i32,
    owned: bool,
}

impl ClaimHandle {
    /// Whether this handle actually holds the partition. A cancelled claim
    /// yields a handle that owns nothing.
    pub fn owns_partition(&self) -> bool {
        self.owned
    }

    /// Drop one reference to the claim. The owner node is deleted when the
    /// last reference is released. Releasing a non-owning handle is a no-op.
    pub async fn release(self) {
        if self.owned {
            self.claimant.release_one(&self.topic, self.partition).await;
        }
    }
}

impl std::fmt::Debug for ClaimHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimHandle")
            .field("topic", &self.topic)
            .field("partition", &self.partition)
            .field("owned", &self.owned)
            .finish()
    }
}
