//! EduBrain · question answer lookup backend
//!
//! - Axum HTTP API (`/api/search`, `/api/health`, `/api/cache/clear`, `/api/records`)
//! - Answer resolution: in-memory cache, concurrent external question banks,
//!   then an AI fallback (OpenAI-compatible or Gemini)
//!
//! Configuration comes from the environment (and `.env`); see `config.rs`.
//!   LOG_LEVEL    : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT   : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod cache;
mod external;
mod ai;
mod resolver;
mod validation;
mod records;
mod state;
mod protocol;
mod logic;
mod routes;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Settings;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = match Settings::from_env() {
    Ok(s) => s,
    Err(e) => {
      error!(target: "edubrain_backend", error = %e, "Invalid configuration");
      return Err(e.into());
    }
  };

  // Resolver (cache, external banks, AI client) + records log.
  let state = Arc::new(AppState::from_settings(&settings)?);
  let app = build_router(state);

  let listener = TcpListener::bind(settings.addr).await?;
  info!(
    target: "edubrain_backend",
    addr = %settings.addr,
    provider = settings.ai.provider.as_str(),
    model = %settings.ai.model,
    "HTTP server listening"
  );
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "edubrain_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "edubrain_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "edubrain_backend", "Shutdown signal received");
}
