//! # Observability
//!
//! Tracing initialization for binaries and tests embedding the crate. The
//! library itself only emits through the `tracing` and `metrics` facades;
//! the host process decides where those go.
//!
//! Counters emitted by the crate:
//! - `cache_local_hits` / `cache_local_misses` / `cache_local_expired_swept`
//! - `cache_remote_hits` / `cache_remote_misses` / `cache_remote_errors`
//! - `cache_remote_read_degraded` / `cache_remote_write_errors`
//! - `cache_factory_calls`
//! - `cache_flight_led` / `cache_flight_joined`
//! - `cache_serialization_errors`
//! - `cache_publish_errors` / `cache_invalidation_transport_errors`
//! - `cache_invalidations_received`
//!
//! The transport/publish error counters matter most operationally: a nonzero
//! rate means the bounded-staleness guarantee has quietly become a
//! TTL-only guarantee.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with an env-filter (`RUST_LOG` style), optionally as
/// JSON lines for log shippers. Safe to call once per process; returns
/// whether this call installed the subscriber.
pub fn init_tracing(default_filter: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}
