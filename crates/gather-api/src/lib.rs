//! # gather-api
//!
//! The Remote Data Gateway: the only component in the workspace allowed to
//! perform network I/O.  Wraps the platform's GraphQL endpoint (reads) and
//! REST API (profile, auth and all mutations) behind typed functions, and
//! recognizes demo credentials before any network call is attempted.
//!
//! The gateway never retries; retry, if any, belongs to the query cache in
//! the client layer.

pub mod api;
pub mod client;
pub mod demo;

mod error;
mod graphql;
mod rest;

pub use api::EventsApi;
pub use client::{ApiClient, ApiConfig};
pub use error::ApiError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;
