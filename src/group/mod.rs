//! Consumer-group coordination
//!
//! This module implements group membership and partition ownership on top of
//! the coordination-service client seam:
//!
//! - [`GroupMember`]: the per-member handle (spawn, intents, snapshots,
//!   claims, stop)
//! - the reconciler: the debounced membership-diff engine behind the handle
//! - [`GroupRegistry`]: node layout and payload encoding for one group
//! - [`ClaimHandle`]: refcounted exclusive ownership of a partition

pub mod claims;
pub mod member;
pub mod registry;
pub mod subscription;

mod reconciler;

pub use claims::ClaimHandle;
pub use member::GroupMember;
pub use registry::GroupRegistry;
pub use subscription::{normalize_topics, MembershipSnapshot, Subscriptions};
