//! `tracing-subscriber` setup for binaries. The library never installs a
//! subscriber on its own.

use tracing_subscriber::EnvFilter;

/// Log at `info` unless `RUST_LOG` says otherwise.
pub fn init() {
    init_with_filter("info");
}

/// Use `RUST_LOG` when set, `default_filter` otherwise. Calling it again
/// after a subscriber is installed is a no-op.
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }
}
