use std::time::Duration;

/// Token prefix that marks a synthetic demo credential.
pub const DEMO_TOKEN_PREFIX: &str = "demo_";

/// Artificial latency applied to simulated demo mutations.
pub const DEMO_LATENCY: Duration = Duration::from_millis(500);

/// Persisted-store key for the auth token.
pub const KEY_AUTH_TOKEN: &str = "auth_token";

/// Persisted-store key prefix for per-user starred event id sets.
pub const KEY_PREFIX_STARRED: &str = "starred_events_cache_";

/// Persisted-store key prefix for per-user attending event id sets.
pub const KEY_PREFIX_ATTENDING: &str = "user_events_cache_";

/// Persisted-store key prefix for per-event detail snapshots.
pub const KEY_PREFIX_EVENT_DETAIL: &str = "event_detail_cache_";

/// Persisted-store key prefix for query-cache snapshots.  The full key
/// carries [`QUERY_CACHE_VERSION`]; bumping the version invalidates every
/// previously persisted snapshot wholesale.
pub const KEY_PREFIX_QUERY_CACHE: &str = "query_cache_";

/// Cache-buster version string for the persisted query-cache snapshot.
pub const QUERY_CACHE_VERSION: &str = "v1";

/// Event detail snapshots older than this are treated as absent.
pub const EVENT_DETAIL_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Freshness window for event list queries.
pub const EVENT_LIST_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// Eviction window for event list queries.
pub const EVENT_LIST_EVICT_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Freshness window for profile queries.
pub const PROFILE_STALE_AFTER: Duration = Duration::from_secs(10 * 60);

/// Freshness window for group list queries.
pub const GROUP_STALE_AFTER: Duration = Duration::from_secs(30 * 60);

/// Minimum interval between persisted query-cache flushes.
pub const QUERY_CACHE_FLUSH_THROTTLE: Duration = Duration::from_secs(1);

/// Gateway request timeout; expiry is reported as a gateway failure.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Default page size for event list pagination.
pub const DEFAULT_PAGE_SIZE: usize = 20;
