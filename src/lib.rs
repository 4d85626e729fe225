#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Groupline
//!
//! Groupline is a consumer-group membership and partition-ownership
//! coordinator built on a hierarchical coordination service (ZooKeeper-style:
//! ephemeral nodes, one-shot watches, sessions). It is the coordination
//! module of a proxy that mediates access to a partitioned message broker.
//!
//! Members of a consumer group use it for two things:
//!
//! - **Membership**: publish the member's topic subscription and receive,
//!   through a single coalesced stream, the full group-wide subscription map
//!   whenever it actually changes. Storms of subscription changes and watch
//!   events are debounced into at most one notification per real change.
//! - **Ownership**: claim and release exclusive ownership of
//!   `(topic, partition)` pairs, blocking until the partition frees up and
//!   honouring a caller-supplied cancellation token.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use groupline::{CoordinatorConfig, GroupMember, MemoryCoordination};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> groupline::Result<()> {
//!     let service = Arc::new(MemoryCoordination::new());
//!     let config = CoordinatorConfig::default();
//!
//!     let mut member = GroupMember::spawn("analytics", "m1", &config, service);
//!
//!     // Advertise a subscription; duplicates and order are irrelevant.
//!     member
//!         .topics()
//!         .send(vec!["clicks".to_string(), "views".to_string()])
//!         .await
//!         .ok();
//!
//!     // The group-wide membership map, coalesced per debounce window.
//!     if let Some(snapshot) = member.subscriptions().recv().await {
//!         println!("membership: {snapshot:?}");
//!     }
//!
//!     // Exclusive partition ownership with cancellation.
//!     let cancel = CancellationToken::new();
//!     let claim = member.claim_partition("clicks", 0, &cancel).await?;
//!     assert!(claim.owns_partition());
//!     claim.release().await;
//!
//!     member.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`coordination`]: the coordination-service client seam and the
//!   in-memory implementation backing tests and embedded use
//! - [`group`]: group node layout, the debounced membership reconciler,
//!   refcounted partition claims, and the member handle
//! - [`config`]: coordinator configuration
//! - [`error`]: error types and the crate [`Result`] alias
//!
//! ## Interoperability
//!
//! The coordination-service layout is bit-exact with other implementations
//! of the same protocol:
//!
//! ```text
//! /consumers/<group>/ids/<memberId>                 data = JSON array of topics
//! /consumers/<group>/owners/<topic>/<partition>     data = memberId bytes
//! ```

pub mod config;
pub mod coordination;
pub mod error;
pub mod group;

pub use config::CoordinatorConfig;
pub use coordination::{CoordinationClient, MemoryCoordination, WatchEvent};
pub use error::{CoordinationError, GrouplineError, Result};
pub use group::{
    normalize_topics, ClaimHandle, GroupMember, GroupRegistry, MembershipSnapshot, Subscriptions,
};
