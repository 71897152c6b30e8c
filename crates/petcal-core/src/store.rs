//! The `CalendarStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `petcal-store-memory`).
//! Higher layers (`petcal-api`, `petcal-realtime`) depend on this abstraction,
//! not on any concrete backend; it is the seam at which a real database
//! replaces the in-memory store.
//!
//! Every read and write is scoped to an account. An item that exists under a
//! different account is indistinguishable from one that does not exist.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  item::{CalendarItem, ItemPatch, NewCalendarItem},
  query::{ItemFilters, Page, Pagination, SortField, SortOrder},
  version::CalendarEventVersion,
};

/// Abstraction over a calendar store backend.
///
/// Implementations must record exactly one [`CalendarEventVersion`] per
/// successful create, update and delete. A failure to record that version
/// must not fail the mutation itself.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CalendarStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new item. The store assigns `id`, `created_at` and
  /// `updated_at` and returns the canonical record.
  fn create(
    &self,
    input: NewCalendarItem,
  ) -> impl Future<Output = Result<CalendarItem, Self::Error>> + Send + '_;

  /// Merge `patch` into an existing item and refresh `updated_at`.
  /// Returns `None` if the item does not exist in `account_id`.
  fn update<'a>(
    &'a self,
    id: Uuid,
    account_id: &'a str,
    patch: ItemPatch,
  ) -> impl Future<Output = Result<Option<CalendarItem>, Self::Error>> + Send + 'a;

  /// Remove an item. Returns whether anything was deleted.
  fn delete<'a>(
    &'a self,
    id: Uuid,
    account_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Reschedule an item; only `scheduled_for` (and `updated_at`) change.
  fn move_item<'a>(
    &'a self,
    id: Uuid,
    account_id: &'a str,
    scheduled_for: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<CalendarItem>, Self::Error>> + Send + 'a
  {
    self.update(id, account_id, ItemPatch::reschedule(scheduled_for))
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve an item. Returns `None` if not found in `account_id`.
  fn get_by_id<'a>(
    &'a self,
    id: Uuid,
    account_id: &'a str,
  ) -> impl Future<Output = Result<Option<CalendarItem>, Self::Error>> + Send + 'a;

  /// Filter, sort and paginate the items of one account.
  fn query<'a>(
    &'a self,
    account_id: &'a str,
    filters: &'a ItemFilters,
    pagination: Pagination,
  ) -> impl Future<Output = Result<Page<CalendarItem>, Self::Error>> + Send + 'a;

  /// Every item scheduled within `[start, end]` that also matches
  /// `filters`, in ascending `scheduled_for` order.
  fn get_by_date_range<'a>(
    &'a self,
    account_id: &'a str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    filters: &'a ItemFilters,
  ) -> impl Future<Output = Result<Vec<CalendarItem>, Self::Error>> + Send + 'a
  {
    async move {
      let ranged = ItemFilters { from: Some(start), to: Some(end), ..filters.clone() };
      let pagination =
        Pagination::unbounded().sorted(SortField::ScheduledFor, SortOrder::Asc);
      let page = self.query(account_id, &ranged, pagination).await?;
      Ok(page.items)
    }
  }

  /// All versions recorded for one item, newest first.
  fn get_version_history<'a>(
    &'a self,
    item_id: Uuid,
    account_id: &'a str,
  ) -> impl Future<Output = Result<Vec<CalendarEventVersion>, Self::Error>> + Send + 'a;
}
