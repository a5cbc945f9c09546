//! Static placeholder data served for demo credentials.
//!
//! A demo credential lets the product be explored without an account and
//! without mutating server state: the gateway resolves mutations after an
//! artificial delay and serves these fixtures for authenticated reads.

use gather_shared::constants::DEMO_LATENCY;
use gather_shared::models::Profile;
use gather_shared::types::{EventId, ProfileId};

/// Profile id used by every demo fixture.
pub const DEMO_PROFILE_ID: ProfileId = ProfileId(0);

/// Simulated network latency for demo mutations.
pub(crate) async fn simulate_latency() {
    tokio::time::sleep(DEMO_LATENCY).await;
}

/// The profile behind a demo credential.
pub fn demo_profile() -> Profile {
    Profile {
        id: DEMO_PROFILE_ID,
        handle: "demo".to_string(),
        nickname: Some("Demo Explorer".to_string()),
        image_url: None,
        about: Some("Looking around without an account.".to_string()),
        verified: false,
        status: None,
    }
}

/// Events a demo user appears to have starred.
pub fn demo_starred_event_ids() -> Vec<EventId> {
    vec![EventId(101), EventId(205)]
}

/// Events a demo user appears to be attending.
pub fn demo_attending_event_ids() -> Vec<EventId> {
    vec![EventId(101)]
}
