//! Read-only JSON REST API over the calendar store.
//!
//! Exposes an axum [`Router`] backed by any
//! [`petcal_core::store::CalendarStore`]. This is the surface analytics and
//! other downstream consumers read from; writes go through the realtime
//! channel so that every mutation is broadcast. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", petcal_api::api_router(store.clone()))
//! ```

pub mod calendar;
pub mod error;
pub mod items;

use std::sync::Arc;

use axum::{Router, routing::get};
use petcal_core::store::CalendarStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: CalendarStore + 'static,
{
  Router::new()
    .route("/accounts/{account_id}/items", get(items::list::<S>))
    .route("/accounts/{account_id}/items/{id}", get(items::get_one::<S>))
    .route("/accounts/{account_id}/items/{id}/history", get(items::history::<S>))
    .route("/accounts/{account_id}/calendar", get(calendar::handler::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests;
