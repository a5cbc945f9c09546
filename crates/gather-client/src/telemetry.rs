//! Logging setup for binaries embedding the sync layer.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.  `RUST_LOG` overrides the default
/// filter.  Safe to call once per process; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("gather_client=debug,gather_api=debug,gather_store=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
