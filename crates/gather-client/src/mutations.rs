//! Optimistic mutation coordinator.
//!
//! Every mutation follows the same shape: snapshot what it is about to
//! touch, apply the expected outcome locally, fire the gateway call, then
//! commit (invalidate affected queries) or roll the snapshots back
//! verbatim.  Mutations on the same event queue behind each other, so a
//! rapid double tap issues both operations in order instead of dropping
//! or interleaving them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use gather_api::EventsApi;
use gather_shared::types::{EventId, ProfileId};
use gather_shared::Credential;

use crate::context::CacheContext;
use crate::error::{ClientError, Result};
use crate::service::group_events_prefix;

pub struct MutationCoordinator<A: EventsApi> {
    api: Arc<A>,
    ctx: Arc<CacheContext>,
    // One async mutex per event; entries accumulate but only for events
    // the user actually mutated.
    event_locks: StdMutex<HashMap<EventId, Arc<AsyncMutex<()>>>>,
}

impl<A: EventsApi> MutationCoordinator<A> {
    pub fn new(api: Arc<A>, ctx: Arc<CacheContext>) -> Self {
        Self {
            api,
            ctx,
            event_locks: StdMutex::new(HashMap::new()),
        }
    }

    fn event_lock(&self, id: EventId) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.event_locks.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        Arc::clone(locks.entry(id).or_default())
    }

    /// Star or unstar an event.
    ///
    /// Only the viewer's starred set changes; list and detail data carry
    /// no star flag (it is derived at view time), so nothing else needs
    /// patching or invalidating.
    pub async fn set_starred(
        &self,
        cred: &Credential,
        viewer: ProfileId,
        id: EventId,
        starred: bool,
    ) -> Result<()> {
        let lock = self.event_lock(id);
        let _guard = lock.lock().await;

        let snapshot = self.ctx.starred.get_raw(viewer);
        if starred {
            self.ctx.starred.add(viewer, id);
        } else {
            self.ctx.starred.remove(viewer, id);
        }

        let result = if starred {
            self.api.star(id, cred).await
        } else {
            self.api.unstar(id, cred).await
        };

        match result {
            Ok(()) => {
                debug!(event = %id, starred, "star mutation committed");
                Ok(())
            }
            Err(e) => {
                warn!(event = %id, starred, error = %e, "star mutation failed, rolling back");
                self.ctx.starred.restore(viewer, snapshot);
                Err(ClientError::from(e).classify())
            }
        }
    }

    /// Join or leave an event.
    ///
    /// Touches three places: the viewer's attending set, the cached
    /// detail snapshot's participant count, and the participant counts
    /// inside every cached group-events list.  All three are snapshotted
    /// before the speculative apply and restored verbatim on failure.
    pub async fn set_attending(
        &self,
        cred: &Credential,
        viewer: ProfileId,
        id: EventId,
        attending: bool,
    ) -> Result<()> {
        let lock = self.event_lock(id);
        let _guard = lock.lock().await;

        let set_snapshot = self.ctx.attending.get_raw(viewer);
        let detail_snapshot = self.ctx.event_details.get_raw(id);
        let list_snapshot = self.ctx.queries.snapshot_prefix(&group_events_prefix());

        let delta: i64 = if attending { 1 } else { -1 };
        if attending {
            self.ctx.attending.add(viewer, id);
        } else {
            self.ctx.attending.remove(viewer, id);
        }
        if let Some(mut stored) = self.ctx.event_details.get_raw(id) {
            stored.event.participants_count =
                (stored.event.participants_count + delta).max(0);
            self.ctx.event_details.restore(id, Some(stored));
        }
        self.ctx.queries.update(&group_events_prefix(), |_key, data| {
            patch_participant_count(data, id, delta);
        });

        let result = if attending {
            self.api.attend(id, cred).await
        } else {
            self.api.cancel_attendance(id, cred).await
        };

        match result {
            Ok(()) => {
                // The server may have adjusted more than the count (for
                // instance the participant list), so affected lists are
                // marked for revalidation.
                self.ctx.queries.invalidate(&group_events_prefix());
                debug!(event = %id, attending, "attendance mutation committed");
                Ok(())
            }
            Err(e) => {
                warn!(event = %id, attending, error = %e, "attendance mutation failed, rolling back");
                self.ctx.attending.restore(viewer, set_snapshot);
                self.ctx.event_details.restore(id, detail_snapshot);
                match list_snapshot {
                    Some(snapshot) => self.ctx.queries.restore(snapshot),
                    None => {
                        // Without a snapshot the speculative patch cannot
                        // be undone precisely; force a reload instead.
                        warn!(event = %id, "no list snapshot, invalidating instead of restoring");
                        self.ctx.queries.invalidate(&group_events_prefix());
                    }
                }
                Err(ClientError::from(e).classify())
            }
        }
    }
}

/// Adjust `participants_count` of the event with `id` inside a cached
/// list value, clamping at zero.
fn patch_participant_count(data: &mut Value, id: EventId, delta: i64) {
    let Some(items) = data.as_array_mut() else {
        return;
    };
    for item in items {
        let matches = item
            .get("id")
            .and_then(Value::as_i64)
            .is_some_and(|v| v == id.0);
        if !matches {
            continue;
        }
        let count = item
            .get("participants_count")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        item["participants_count"] = Value::from((count + delta).max(0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_cache::FreshnessPolicy;
    use crate::service::group_events_key;
    use crate::testutil::{sample_event, StubApi};
    use gather_shared::types::GroupId;
    use std::sync::atomic::Ordering;

    const VIEWER: ProfileId = ProfileId(42);
    const GROUP: GroupId = GroupId(3579);

    fn coordinator() -> (Arc<StubApi>, Arc<CacheContext>, MutationCoordinator<StubApi>) {
        let api = Arc::new(StubApi::default());
        let ctx = CacheContext::in_memory();
        let coord = MutationCoordinator::new(Arc::clone(&api), Arc::clone(&ctx));
        (api, ctx, coord)
    }

    fn cred() -> Credential {
        Credential::from_token("tok_test")
    }

    fn seed_group_list(ctx: &Arc<CacheContext>, event_id: i64, count: i64) {
        let mut event = sample_event(event_id);
        event.participants_count = count;
        ctx.queries.write_with(
            group_events_key(GROUP, true),
            serde_json::json!([serde_json::to_value(&event).unwrap()]),
            FreshnessPolicy::event_list(),
        );
    }

    fn cached_count(ctx: &Arc<CacheContext>, event_id: i64) -> i64 {
        let snapshot = ctx.queries.snapshot_prefix(&group_events_prefix()).unwrap();
        let item = snapshot[0]
            .1
            .as_array()
            .unwrap()
            .iter()
            .find(|v| v["id"] == event_id)
            .cloned()
            .unwrap();
        item["participants_count"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn star_applies_optimistically() {
        let (api, ctx, coord) = coordinator();

        coord
            .set_starred(&cred(), VIEWER, EventId(7), true)
            .await
            .unwrap();

        assert!(ctx.starred.contains(VIEWER, EventId(7)));
        assert_eq!(api.calls(), vec!["star"]);
    }

    /// A failed star leaves the starred set exactly as it was and
    /// surfaces the gateway error.
    #[tokio::test]
    async fn failed_star_rolls_back() {
        let (api, ctx, coord) = coordinator();
        ctx.starred.add(VIEWER, EventId(1));
        api.fail_mutations.store(true, Ordering::SeqCst);

        let err = coord
            .set_starred(&cred(), VIEWER, EventId(7), true)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Api(_)));
        assert!(!ctx.starred.contains(VIEWER, EventId(7)));
        assert!(ctx.starred.contains(VIEWER, EventId(1)));
    }

    /// Joining an event bumps the cached participant
    /// count immediately, commits on gateway success, and marks the list
    /// for revalidation.
    #[tokio::test]
    async fn attend_commits_and_invalidates() {
        let (api, ctx, coord) = coordinator();
        seed_group_list(&ctx, 7, 5);
        ctx.event_details.set(&{
            let mut e = sample_event(7);
            e.participants_count = 5;
            e
        });

        coord
            .set_attending(&cred(), VIEWER, EventId(7), true)
            .await
            .unwrap();

        assert!(ctx.attending.contains(VIEWER, EventId(7)));
        assert_eq!(cached_count(&ctx, 7), 6);
        assert_eq!(
            ctx.event_details.get(EventId(7)).unwrap().participants_count,
            6
        );
        assert_eq!(api.calls(), vec!["attend"]);

        // The committed list is stale: the next read serves it but
        // triggers a reload.
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let _: Vec<serde_json::Value> = ctx
            .queries
            .read(
                group_events_key(GROUP, true),
                FreshnessPolicy::event_list(),
                move || async move {
                    calls2.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                },
            )
            .await
            .unwrap();
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// A failed join restores the set, the detail snapshot and the
    /// cached list counts verbatim.
    #[tokio::test]
    async fn failed_attend_restores_counts() {
        let (api, ctx, coord) = coordinator();
        seed_group_list(&ctx, 7, 5);
        let mut detail = sample_event(7);
        detail.participants_count = 5;
        ctx.event_details.set(&detail);
        api.fail_mutations.store(true, Ordering::SeqCst);

        let err = coord
            .set_attending(&cred(), VIEWER, EventId(7), true)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Api(_)));
        assert!(!ctx.attending.contains(VIEWER, EventId(7)));
        assert_eq!(cached_count(&ctx, 7), 5);
        assert_eq!(
            ctx.event_details.get(EventId(7)).unwrap().participants_count,
            5
        );
    }

    /// An expired token rolls back and classifies as an auth failure.
    #[tokio::test]
    async fn expired_token_surfaces_as_auth() {
        let (api, ctx, coord) = coordinator();
        api.auth_expired.store(true, Ordering::SeqCst);

        let err = coord
            .set_attending(&cred(), VIEWER, EventId(7), true)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Auth));
        assert!(!ctx.attending.contains(VIEWER, EventId(7)));
    }

    /// A rapid join/leave double tap queues the second operation behind
    /// the first; both reach the gateway, in order, and the second one
    /// wins.
    #[tokio::test(start_paused = true)]
    async fn double_tap_queues_in_order() {
        let (api, ctx, coord) = coordinator();
        *api.mutation_delay.lock().unwrap() = Some(std::time::Duration::from_millis(50));
        let coord = Arc::new(coord);

        let join = {
            let coord = Arc::clone(&coord);
            async move { coord.set_attending(&cred(), VIEWER, EventId(7), true).await }
        };
        let leave = {
            let coord = Arc::clone(&coord);
            async move { coord.set_attending(&cred(), VIEWER, EventId(7), false).await }
        };

        let (a, b) = tokio::join!(join, leave);
        a.unwrap();
        b.unwrap();

        assert_eq!(api.calls(), vec!["attend", "cancel"]);
        assert!(!ctx.attending.contains(VIEWER, EventId(7)));
    }

    #[test]
    fn count_patch_clamps_at_zero() {
        let mut data = serde_json::json!([{"id": 7, "participants_count": 0}]);
        patch_participant_count(&mut data, EventId(7), -1);
        assert_eq!(data[0]["participants_count"], 0);

        patch_participant_count(&mut data, EventId(7), 1);
        assert_eq!(data[0]["participants_count"], 1);

        // Other events untouched.
        let mut data = serde_json::json!([{"id": 8, "participants_count": 3}]);
        patch_participant_count(&mut data, EventId(7), 1);
        assert_eq!(data[0]["participants_count"], 3);
    }
}
