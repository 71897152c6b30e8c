//! Management and introspection endpoints.

use axum::{
  Json,
  extract::{Path, State},
};
use petcal_core::store::CalendarStore;

use crate::{
  AppState,
  connections::ClientInfo,
  hub::AccountSummary,
  subscriptions::CalendarSubscription,
};

pub async fn clients<S>(State(state): State<AppState<S>>) -> Json<Vec<ClientInfo>>
where
  S: CalendarStore + Clone + 'static,
{
  Json(state.service.hub().clients())
}

pub async fn subscriptions<S>(
  State(state): State<AppState<S>>,
) -> Json<Vec<CalendarSubscription>>
where
  S: CalendarStore + Clone + 'static,
{
  Json(state.service.hub().subscriptions())
}

pub async fn account_clients<S>(
  State(state): State<AppState<S>>,
  Path(account_id): Path<String>,
) -> Json<Vec<ClientInfo>>
where
  S: CalendarStore + Clone + 'static,
{
  Json(state.service.hub().clients_for_account(&account_id))
}

pub async fn account_summary<S>(
  State(state): State<AppState<S>>,
  Path(account_id): Path<String>,
) -> Json<AccountSummary>
where
  S: CalendarStore + Clone + 'static,
{
  Json(state.service.hub().account_summary(&account_id))
}
