//! Query, sort and pagination types for [`crate::store::CalendarStore::query`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  item::{CalendarItem, ContentType, Priority},
  status::ItemStatus,
};

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Conjunctive filters; an empty list or `None` disables that condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFilters {
  pub statuses:      Vec<ItemStatus>,
  pub content_types: Vec<ContentType>,
  pub priorities:    Vec<Priority>,
  pub campaign_ids:  Vec<String>,
  /// Matches items carrying at least one of these tags.
  pub tags:          Vec<String>,
  /// Matches items targeting at least one of these channels.
  pub channels:      Vec<String>,
  /// Inclusive lower bound on `scheduled_for`.
  pub from:          Option<DateTime<Utc>>,
  /// Inclusive upper bound on `scheduled_for`.
  pub to:            Option<DateTime<Utc>>,
  /// Case-insensitive substring match over title and description.
  pub search:        Option<String>,
}

impl ItemFilters {
  pub fn matches(&self, item: &CalendarItem) -> bool {
    (self.statuses.is_empty() || self.statuses.contains(&item.status))
      && (self.content_types.is_empty()
        || self.content_types.contains(&item.content_type))
      && (self.priorities.is_empty() || self.priorities.contains(&item.priority))
      && (self.campaign_ids.is_empty()
        || item
          .campaign_id
          .as_ref()
          .is_some_and(|c| self.campaign_ids.contains(c)))
      && (self.tags.is_empty() || item.has_any_tag(self.tags.iter()))
      && (self.channels.is_empty()
        || self.channels.iter().any(|c| item.channels.contains(c)))
      && self.from.is_none_or(|from| item.scheduled_for >= from)
      && self.to.is_none_or(|to| item.scheduled_for <= to)
      && self.search.as_deref().is_none_or(|needle| text_matches(item, needle))
  }
}

fn text_matches(item: &CalendarItem, needle: &str) -> bool {
  let needle = needle.to_lowercase();
  item.title.to_lowercase().contains(&needle)
    || item
      .description
      .as_deref()
      .is_some_and(|d| d.to_lowercase().contains(&needle))
}

// ─── Sorting ─────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortField {
  #[default]
  ScheduledFor,
  CreatedAt,
  UpdatedAt,
  Priority,
  Title,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
  #[default]
  Asc,
  Desc,
}

// ─── Pagination ──────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Offset pagination. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
  pub page:       usize,
  pub limit:      usize,
  pub sort_by:    SortField,
  pub sort_order: SortOrder,
}

impl Default for Pagination {
  fn default() -> Self {
    Self {
      page:       1,
      limit:      DEFAULT_PAGE_LIMIT,
      sort_by:    SortField::default(),
      sort_order: SortOrder::default(),
    }
  }
}

impl Pagination {
  pub fn new(page: usize, limit: usize) -> Self {
    Self { page, limit, ..Self::default() }
  }

  /// A single page holding every match, in ascending `scheduled_for` order.
  pub fn unbounded() -> Self { Self::new(1, usize::MAX) }

  pub fn sorted(mut self, sort_by: SortField, sort_order: SortOrder) -> Self {
    self.sort_by = sort_by;
    self.sort_order = sort_order;
    self
  }

  /// `page` and `limit` clamped to at least 1.
  pub fn normalized(self) -> Self {
    Self { page: self.page.max(1), limit: self.limit.max(1), ..self }
  }
}

/// One page of a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:       Vec<T>,
  pub total:       usize,
  pub page:        usize,
  pub total_pages: usize,
}

impl<T> Page<T> {
  /// Slice `all` (already filtered and sorted) according to `pagination`.
  pub fn paginate(all: Vec<T>, pagination: Pagination) -> Self {
    let Pagination { page, limit, .. } = pagination.normalized();
    let total = all.len();
    let total_pages = total.div_ceil(limit);
    let offset = (page - 1).saturating_mul(limit);
    let items = all.into_iter().skip(offset).take(limit).collect();
    Self { items, total, page, total_pages }
  }
}
