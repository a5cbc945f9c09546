//! # gather-shared
//!
//! Domain models and common types for the Gather events client.
//!
//! Everything here mirrors server-owned entities: the client never
//! originates an `Event`, `Profile` or `Group` identity, it only keeps
//! read-only copies annotated with freshness metadata by the layers above.

pub mod constants;
pub mod credential;
pub mod models;
pub mod time;
pub mod types;

pub use credential::Credential;
pub use models::*;
pub use types::{EventId, GroupId, ProfileId};
