//! Group node layout and payload encoding
//!
//! `GroupRegistry` owns the coordination-service paths of one consumer group
//! and the wire encoding of everything stored under them:
//!
//! ```text
//! /consumers/<group>/ids/<memberId>                 data = JSON array of topics, UTF-8
//! /consumers/<group>/owners/<topic>/<partition>     data = memberId as UTF-8 bytes
//! ```
//!
//! The layout is bit-exact with other implementations of the same protocol,
//! so members written in different languages interoperate on one tree.

use crate::coordination::{CoordinationClient, WatchEvent};
use crate::error::{CoordinationError, Result};
use crate::group::subscription::{normalize_topics, MembershipSnapshot};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::warn;

const CONSUMERS_ROOT: &str = "/consumers";

/// Per-group helper over the coordination client: path layout, payload
/// encoding, and the registration/claim primitives built from them.
#[derive(Clone)]
pub struct GroupRegistry {
    group: String,
    client: Arc<dyn CoordinationClient>,
}

impl GroupRegistry {
    pub fn new(group: impl Into<String>, client: Arc<dyn CoordinationClient>) -> Self {
        Self {
            group: group.into(),
            client,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    fn ids_path(&self) -> String {
        format!("{CONSUMERS_ROOT}/{}/ids", self.group)
    }

    fn member_path(&self, member_id: &str) -> String {
        format!("{CONSUMERS_ROOT}/{}/ids/{member_id}", self.group)
    }

    fn owners_path(&self, topic: &str) -> String {
        format!("{CONSUMERS_ROOT}/{}/owners/{topic}", self.group)
    }

    fn owner_path(&self, topic: &str, partition: i32) -> String {
        format!("{CONSUMERS_ROOT}/{}/owners/{topic}/{partition}", self.group)
    }

    /// Advertise a member's topic list, replacing any previous registration.
    /// The list must already be normalized; an empty list is expressed as an
    /// absent node, never as a node holding `[]`.
    pub async fn register_member(&self, member_id: &str, topics: &[String]) -> Result<()> {
        let path = self.member_path(member_id);
        if topics.is_empty() {
            self.client.delete(&path).await?;
            return Ok(());
        }
        let payload = serde_json::to_vec(topics)?;
        // Only the member's own reconciler writes this node, so
        // delete-then-create cannot race another writer.
        self.client.delete(&path).await?;
        self.client.create_ephemeral(&path, &payload).await?;
        Ok(())
    }

    /// Remove a member's registration. Idempotent.
    pub async fn unregister_member(&self, member_id: &str) -> Result<()> {
        self.client.delete(&self.member_path(member_id)).await?;
        Ok(())
    }

    /// Read the full group subscription map. A child that disappears between
    /// listing and read is skipped; the watch that the disappearance fires
    /// will trigger a fresh pass.
    pub async fn fetch_subscriptions(&self) -> Result<MembershipSnapshot> {
        let (members, _revision) = self.client.get_children(&self.ids_path()).await?;
        let mut snapshot = MembershipSnapshot::new();
        for member_id in members {
            let Some(payload) = self.client.get_data(&self.member_path(&member_id)).await? else {
                continue;
            };
            let topics: Vec<String> = match serde_json::from_slice(&payload) {
                Ok(topics) => topics,
                Err(error) => {
                    warn!(
                        group = %self.group,
                        member = %member_id,
                        %error,
                        "skipping member with undecodable topic payload"
                    );
                    continue;
                }
            };
            snapshot.insert(member_id, normalize_topics(topics));
        }
        Ok(snapshot)
    }

    /// One-shot watch on the group's member registrations.
    pub async fn watch_members(&self) -> Result<oneshot::Receiver<WatchEvent>> {
        Ok(self.client.watch_children(&self.ids_path()).await?)
    }

    /// One-shot watch on a topic's partition owners.
    pub async fn watch_owners(&self, topic: &str) -> Result<oneshot::Receiver<WatchEvent>> {
        Ok(self.client.watch_children(&self.owners_path(topic)).await?)
    }

    /// The member currently owning `(topic, partition)`, if any.
    pub async fn partition_owner(&self, topic: &str, partition: i32) -> Result<Option<String>> {
        let payload = self
            .client
            .get_data(&self.owner_path(topic, partition))
            .await?;
        Ok(payload.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Try to claim `(topic, partition)` for `member_id`. Returns `false`
    /// when another member holds the partition; that is not an error.
    pub async fn claim_partition(
        &self,
        member_id: &str,
        topic: &str,
        partition: i32,
    ) -> Result<bool> {
        let path = self.owner_path(topic, partition);
        match self
            .client
            .create_ephemeral(&path, member_id.as_bytes())
            .await
        {
            Ok(()) => Ok(true),
            Err(CoordinationError::Conflict(_)) => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    /// Drop the owner node of `(topic, partition)`. Idempotent.
    pub async fn release_partition(&self, topic: &str, partition: i32) -> Result<()> {
        self.client
            .delete(&self.owner_path(topic, partition))
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}
