//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! - LOG_LEVEL holds EnvFilter directives, e.g. "debug" or
//!   "info,resolver=debug,edubrain_backend=debug,tower_http=info,axum=info".
//! - LOG_FORMAT=json switches to structured JSON lines; anything else is the
//!   default human-readable format.
//!
//! Targets: `edubrain_backend` (startup, HTTP), `resolver` (per-request stage
//! transitions). Tower HTTP TraceLayer adds per-request spans on top.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,resolver=debug,edubrain_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // json() changes the builder type, so each arm initializes on its own.
    if matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
