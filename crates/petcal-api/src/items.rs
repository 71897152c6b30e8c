//! Handlers for `/accounts/{account_id}/items` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/accounts/{account_id}/items` | Filters, sort and pagination as query params |
//! | `GET`  | `/accounts/{account_id}/items/{id}` | 404 if not found in the account |
//! | `GET`  | `/accounts/{account_id}/items/{id}/history` | Versions, newest first |

use std::{str::FromStr, sync::Arc};

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use petcal_core::{
  item::CalendarItem,
  query::{DEFAULT_PAGE_LIMIT, ItemFilters, Page, Pagination, SortField, SortOrder},
  store::CalendarStore,
  version::CalendarEventVersion,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// Query parameters for `GET /accounts/{account_id}/items`.
///
/// List-valued filters are comma-separated, e.g. `status=draft,scheduled`.
#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub status:       Option<String>,
  pub content_type: Option<String>,
  pub priority:     Option<String>,
  pub campaign_id:  Option<String>,
  pub tags:         Option<String>,
  pub channels:     Option<String>,
  pub from:         Option<DateTime<Utc>>,
  pub to:           Option<DateTime<Utc>>,
  pub search:       Option<String>,
  pub sort_by:      Option<String>,
  pub sort_order:   Option<String>,
  pub page:         Option<usize>,
  pub limit:        Option<usize>,
}

impl ListParams {
  pub(crate) fn filters(&self) -> Result<ItemFilters, ApiError> {
    Ok(ItemFilters {
      statuses:      parse_list(self.status.as_deref(), "status")?,
      content_types: parse_list(self.content_type.as_deref(), "content_type")?,
      priorities:    parse_list(self.priority.as_deref(), "priority")?,
      campaign_ids:  parse_list(self.campaign_id.as_deref(), "campaign_id")?,
      tags:          parse_list(self.tags.as_deref(), "tags")?,
      channels:      parse_list(self.channels.as_deref(), "channels")?,
      from:          self.from,
      to:            self.to,
      search:        self.search.clone().filter(|s| !s.trim().is_empty()),
    })
  }

  fn pagination(&self) -> Result<Pagination, ApiError> {
    let sort_by = parse_one::<SortField>(self.sort_by.as_deref(), "sort_by")?;
    let sort_order = parse_one::<SortOrder>(self.sort_order.as_deref(), "sort_order")?;
    Ok(
      Pagination::new(
        self.page.unwrap_or(1),
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
      )
      .sorted(sort_by.unwrap_or_default(), sort_order.unwrap_or_default()),
    )
  }
}

/// Split a comma-separated parameter and parse every element.
fn parse_list<T: FromStr>(raw: Option<&str>, name: &str) -> Result<Vec<T>, ApiError> {
  raw
    .into_iter()
    .flat_map(|s| s.split(','))
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| {
      s.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {name}: {s:?}")))
    })
    .collect()
}

fn parse_one<T: FromStr>(raw: Option<&str>, name: &str) -> Result<Option<T>, ApiError> {
  raw
    .map(|s| {
      s.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {name}: {s:?}")))
    })
    .transpose()
}

/// `GET /accounts/{account_id}/items[?status=..][&content_type=..][&page=..][&limit=..]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(account_id): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<CalendarItem>>, ApiError>
where
  S: CalendarStore,
{
  let filters = params.filters()?;
  let pagination = params.pagination()?;
  let page = store
    .query(&account_id, &filters, pagination)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /accounts/{account_id}/items/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((account_id, id)): Path<(String, Uuid)>,
) -> Result<Json<CalendarItem>, ApiError>
where
  S: CalendarStore,
{
  let item = store
    .get_by_id(id, &account_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("item {id} not found")))?;
  Ok(Json(item))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /accounts/{account_id}/items/{id}/history`
///
/// Deleted items keep their history, so this never returns 404.
pub async fn history<S>(
  State(store): State<Arc<S>>,
  Path((account_id, id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<CalendarEventVersion>>, ApiError>
where
  S: CalendarStore,
{
  let versions = store
    .get_version_history(id, &account_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(versions))
}
