//! # gather-client
//!
//! The data-synchronization layer between the UI and the events platform:
//! a persisted key-value store behind a degrade-to-miss facade, a generic
//! stale-while-revalidate query cache, typed domain caches for the
//! viewer's starred/attending sets and event details, and an optimistic
//! mutation coordinator that keeps them all consistent with the gateway.
//!
//! The entry points are [`CacheContext`] (built once at startup) and
//! [`SyncService`] (what the UI calls).

pub mod caches;
pub mod context;
pub mod join_status;
pub mod mutations;
pub mod persist;
pub mod query_cache;
pub mod service;
pub mod session;
pub mod telemetry;

mod error;

#[cfg(test)]
mod testutil;

pub use context::CacheContext;
pub use error::{ClientError, Result};
pub use persist::PersistedStore;
pub use query_cache::{FreshnessPolicy, QueryCache, QueryKey};
pub use service::{EventPage, MyEvents, SyncService};
