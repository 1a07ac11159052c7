//! Question Pipeline · normalization service
//!
//! Turns loosely structured generated question records into canonical,
//! validated questions of one of fifteen kinds.
//!
//! - Axum HTTP + WebSocket API
//! - TOML-configurable detection patterns and validation settings
//! - Rolling validation log with issue statistics
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   PIPELINE_CONFIG_PATH : path to TOML config (settings + extra patterns)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod raw;
mod parser;
mod policy;
mod inference;
mod config;
mod normalize;
mod validator;
mod reporter;
mod fallback;
mod pipeline;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let state = Arc::new(AppState::new());
  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "question_pipeline", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

  let stats = state.pipeline.statistics();
  info!(target: "question_pipeline", total = stats.total_validations, mismatches = stats.kind_mismatches, "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "question_pipeline", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
}
