//! Coordination-service client seam
//!
//! The coordinator talks to a hierarchical coordination service (ZooKeeper or
//! compatible: ephemeral nodes, one-shot child watches, sessions) exclusively
//! through the [`CoordinationClient`] trait defined here. The trait is a
//! straight passthrough with no caching; retry and backoff policy live in the
//! layers above it.
//!
//! An in-memory implementation, [`MemoryCoordination`], backs the test suite
//! and embedded single-process deployments, including session-expiry
//! simulation.

pub mod memory;

pub use memory::MemoryCoordination;

use crate::error::CoordinationError;
use async_trait::async_trait;
use tokio::sync::oneshot;

/// Notification delivered by a one-shot child watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    /// A direct child of the watched path was created or deleted
    ChildrenChanged,
    /// The session backing every ephemeral node was lost
    SessionLost,
}

/// Contract over the external coordination service.
///
/// All operations fail with [`CoordinationError`]: `Unavailable` for
/// transient trouble, `SessionLost` once the session is gone, `Conflict`
/// when an ephemeral create races an existing node.
///
/// Watches are one-shot: a watch fires at most once, on the first child
/// add/remove or session event after installation, and the caller re-installs
/// it. To avoid missed wake-ups, install the watch *before* reading the state
/// it guards.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Atomically create an ephemeral node. Fails with `Conflict` if the
    /// node already exists.
    async fn create_ephemeral(&self, path: &str, data: &[u8]) -> Result<(), CoordinationError>;

    /// Delete a node. Idempotent: deleting a missing node succeeds.
    async fn delete(&self, path: &str) -> Result<(), CoordinationError>;

    /// List the names of a node's direct children together with the store
    /// revision the listing was taken at. A missing path yields an empty
    /// listing.
    async fn get_children(&self, path: &str) -> Result<(Vec<String>, i64), CoordinationError>;

    /// Install a one-shot watch on a node's direct children.
    async fn watch_children(
        &self,
        path: &str,
    ) -> Result<oneshot::Receiver<WatchEvent>, CoordinationError>;

    /// Fetch a node's payload; `None` when the node is absent.
    async fn get_data(&self, path: &str) -> Result<Option<Vec<u8>>, CoordinationError>;
}
