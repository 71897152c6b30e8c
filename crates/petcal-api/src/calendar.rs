//! Handler for `GET /accounts/{account_id}/calendar`: the calendar-view
//! read, unpaginated.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use petcal_core::{item::CalendarItem, store::CalendarStore};
use serde::Deserialize;

use crate::{error::ApiError, items::ListParams};

#[derive(Debug, Deserialize)]
pub struct RangeParams {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

/// `GET /accounts/{account_id}/calendar?start=<rfc3339>&end=<rfc3339>[&content_type=..]`
///
/// Accepts the same filter parameters as the item list; sort and pagination
/// parameters are ignored.
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  Path(account_id): Path<String>,
  Query(range): Query<RangeParams>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<CalendarItem>>, ApiError>
where
  S: CalendarStore,
{
  if range.start > range.end {
    return Err(ApiError::BadRequest("start must not be after end".into()));
  }
  let filters = params.filters()?;
  let items = store
    .get_by_date_range(&account_id, range.start, range.end, &filters)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(items))
}
