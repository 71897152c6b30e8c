//! Ordering of query results.

use std::cmp::Ordering;

use petcal_core::{
  item::CalendarItem,
  query::{SortField, SortOrder},
};

/// Sort `items` by `field`/`order`. Ties are broken by item id so that
/// consecutive pages never overlap or skip an item.
pub(crate) fn sort_items(items: &mut [CalendarItem], field: SortField, order: SortOrder) {
  items.sort_by(|a, b| {
    let primary = compare(a, b, field);
    let primary = match order {
      SortOrder::Asc => primary,
      SortOrder::Desc => primary.reverse(),
    };
    primary.then_with(|| a.id.cmp(&b.id))
  });
}

fn compare(a: &CalendarItem, b: &CalendarItem, field: SortField) -> Ordering {
  match field {
    SortField::ScheduledFor => a.scheduled_for.cmp(&b.scheduled_for),
    SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    SortField::Priority => a.priority.severity().cmp(&b.priority.severity()),
    SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
  }
}
