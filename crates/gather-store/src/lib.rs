//! # gather-store
//!
//! Durable on-device key-value storage for the Gather events client,
//! backed by SQLite.
//!
//! The store holds small JSON blobs: the auth token, per-user starred and
//! attending id sets, per-event detail snapshots and the query-cache
//! snapshot.  The crate exposes a synchronous [`Database`] handle with
//! typed errors; degrading failures to cache misses is the responsibility
//! of the client layer above.

pub mod database;
pub mod kv;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::StoreError;
