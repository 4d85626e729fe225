//! In-memory coordination service
//!
//! A process-local implementation of [`CoordinationClient`] over a flat node
//! tree. Every node is ephemeral and bound to one simulated session shared by
//! the whole process, mirroring how the coordinator shares a single
//! coordination-service session in production. `expire_session` drops every
//! node and fires every outstanding watch with [`WatchEvent::SessionLost`],
//! which is how the test suite exercises the fatal error path.

use super::{CoordinationClient, WatchEvent};
use crate::error::CoordinationError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::oneshot;
use tracing::debug;

/// In-memory coordination service shared by all members of one process.
#[derive(Debug, Default)]
pub struct MemoryCoordination {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    /// Full path -> payload. All nodes are ephemeral.
    nodes: BTreeMap<String, Vec<u8>>,
    /// Parent path -> outstanding one-shot child watches.
    watches: HashMap<String, Vec<oneshot::Sender<WatchEvent>>>,
    /// Monotonic store revision, bumped on every mutation.
    revision: i64,
    session_expired: bool,
}

impl State {
    fn fire_watches(&mut self, parent: &str, event: WatchEvent) {
        if let Some(waiters) = self.watches.remove(parent) {
            for waiter in waiters {
                // A dropped receiver just means the watcher went away first.
                let _ = waiter.send(event);
            }
        }
    }

    fn fire_all_watches(&mut self, event: WatchEvent) {
        for (_, waiters) in self.watches.drain() {
            for waiter in waiters {
                let _ = waiter.send(event);
            }
        }
    }

    fn check_session(&self) -> Result<(), CoordinationError> {
        if self.session_expired {
            Err(CoordinationError::SessionLost)
        } else {
            Ok(())
        }
    }
}

/// The parent of `/a/b/c` is `/a/b`; the root is its own parent.
fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

impl MemoryCoordination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire the process-wide session: every node vanishes, every watch
    /// fires with [`WatchEvent::SessionLost`], and subsequent operations fail
    /// with [`CoordinationError::SessionLost`] until [`Self::restore_session`].
    pub fn expire_session(&self) {
        let mut state = self.state.lock();
        debug!(nodes = state.nodes.len(), "expiring coordination session");
        state.session_expired = true;
        state.nodes.clear();
        state.fire_all_watches(WatchEvent::SessionLost);
    }

    /// Re-establish a fresh session after [`Self::expire_session`]. The node
    /// tree starts empty; nothing from the old session is restored.
    pub fn restore_session(&self) {
        self.state.lock().session_expired = false;
    }

    /// Number of nodes currently in the tree (test observability).
    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }
}

#[async_trait]
impl CoordinationClient for MemoryCoordination {
    async fn create_ephemeral(&self, path: &str, data: &[u8]) -> Result<(), CoordinationError> {
        let mut state = self.state.lock();
        state.check_session()?;
        if state.nodes.contains_key(path) {
            return Err(CoordinationError::conflict(path));
        }
        state.nodes.insert(path.to_string(), data.to_vec());
        state.revision += 1;
        state.fire_watches(parent_of(path), WatchEvent::ChildrenChanged);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), CoordinationError> {
        let mut state = self.state.lock();
        state.check_session()?;
        if state.nodes.remove(path).is_some() {
            state.revision += 1;
            state.fire_watches(parent_of(path), WatchEvent::ChildrenChanged);
        }
        Ok(())
    }

    async fn get_children(&self, path: &str) -> Result<(Vec<String>, i64), CoordinationError> {
        let state = self.state.lock();
        state.check_session()?;
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut children = BTreeSet::new();
        for key in state.nodes.range(prefix.clone()..) {
            let (full_path, _) = key;
            let Some(rest) = full_path.strip_prefix(&prefix) else {
                break;
            };
            let name = rest.split('/').next().unwrap_or(rest);
            if !name.is_empty() {
                children.insert(name.to_string());
            }
        }
        Ok((children.into_iter().collect(), state.revision))
    }

    async fn watch_children(
        &self,
        path: &str,
    ) -> Result<oneshot::Receiver<WatchEvent>, CoordinationError> {
        let mut state = self.state.lock();
        state.check_session()?;
        let (tx, rx) = oneshot::channel();
        state
            .watches
            .entry(path.trim_end_matches('/').to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn get_data(&self, path: &str) -> Result<Option<Vec<u8>>, CoordinationError> {
        let state = self.state.lock();
        state.check_session()?;
        Ok(state.nodes.get(path).cloned())
    }
}
