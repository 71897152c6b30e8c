//! Real-time calendar sync server.
//!
//! Clients open a WebSocket, subscribe to one account's calendar with
//! optional filters, and from then on receive every mutation made by any
//! other client of that account that passes their filters. Mutations are
//! sent over the same socket and applied to a
//! [`petcal_core::store::CalendarStore`].
//!
//! The moving parts:
//!
//! - [`protocol`]: the JSON envelope codec.
//! - [`connections`] and [`subscriptions`]: the two registries, bundled as a
//!   [`hub::Hub`].
//! - [`broadcast`]: filter matching and fan-out.
//! - [`liveness`]: heartbeat and stale-connection eviction.
//! - [`service::SyncService`]: the message handling logic, independent of
//!   the transport.
//! - [`ws`] and [`admin`]: the axum surface.

pub mod admin;
pub mod broadcast;
pub mod connections;
pub mod error;
pub mod hub;
pub mod liveness;
pub mod protocol;
pub mod service;
pub mod subscriptions;
pub mod ws;

use std::{sync::Arc, time::Duration};

use axum::{Router, routing::get};
use petcal_core::store::CalendarStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::{Error, ErrorCode, Result};
pub use service::SyncService;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Deserialized from `config.toml` and `PETCAL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                    String,
  #[serde(default = "default_port")]
  pub port:                    u16,
  #[serde(default = "default_heartbeat_interval")]
  pub heartbeat_interval_secs: u64,
  #[serde(default = "default_cleanup_interval")]
  pub cleanup_interval_secs:   u64,
  #[serde(default = "default_stale_threshold")]
  pub stale_threshold_secs:    u64,
  #[serde(default = "default_max_message_bytes")]
  pub max_message_bytes:       usize,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_heartbeat_interval() -> u64 { 30 }
fn default_cleanup_interval() -> u64 { 60 }
fn default_stale_threshold() -> u64 { 300 }
fn default_max_message_bytes() -> usize { 1024 * 1024 }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                    default_host(),
      port:                    default_port(),
      heartbeat_interval_secs: default_heartbeat_interval(),
      cleanup_interval_secs:   default_cleanup_interval(),
      stale_threshold_secs:    default_stale_threshold(),
      max_message_bytes:       default_max_message_bytes(),
    }
  }
}

/// Runtime settings for the sync service and liveness monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
  pub heartbeat_interval: Duration,
  pub cleanup_interval:   Duration,
  pub stale_threshold:    Duration,
  pub max_message_bytes:  usize,
}

impl Default for RealtimeConfig {
  fn default() -> Self { Self::from(&ServerConfig::default()) }
}

impl From<&ServerConfig> for RealtimeConfig {
  fn from(cfg: &ServerConfig) -> Self {
    // Zero periods would make tokio's interval panic.
    let secs = |s: u64| Duration::from_secs(s.max(1));
    Self {
      heartbeat_interval: secs(cfg.heartbeat_interval_secs),
      cleanup_interval:   secs(cfg.cleanup_interval_secs),
      stale_threshold:    secs(cfg.stale_threshold_secs),
      max_message_bytes:  cfg.max_message_bytes,
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: CalendarStore> {
  pub service: Arc<SyncService<S>>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full HTTP surface: the WebSocket endpoint, the management
/// endpoints and the read API under `/api`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: CalendarStore + Clone + 'static,
{
  let api = petcal_api::api_router(state.service.store().clone());
  Router::new()
    .route("/ws",                                  get(ws::handler::<S>))
    .route("/admin/clients",                       get(admin::clients::<S>))
    .route("/admin/subscriptions",                 get(admin::subscriptions::<S>))
    .route("/admin/accounts/{account_id}/clients", get(admin::account_clients::<S>))
    .route("/admin/accounts/{account_id}/summary", get(admin::account_summary::<S>))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}
