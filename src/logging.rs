//! Tracing subscriber setup shared by the service and its tools.
//!
//! `RUST_LOG` wins when set; otherwise the service logs at `info` with its
//! own crate at `debug`.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,gwmon_service=debug";

/// Installs the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
