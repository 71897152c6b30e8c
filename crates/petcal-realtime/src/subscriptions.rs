//! Per-connection subscriptions.
//!
//! A connection holds at most one [`CalendarSubscription`]. Subscribing again
//! replaces the previous one; unsubscribing is idempotent. The registry only
//! refers to connections by id, so dropping a connection is a matter of
//! removing its entry here and in the connection registry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use petcal_core::{item::ContentType, query::ItemFilters};
use serde::{Deserialize, Serialize};

use crate::{
  connections::ConnectionId,
  error::{Error, Result},
};

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

impl DateRange {
  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    self.start <= at && at <= self.end
  }
}

/// What a subscriber wants to hear about. Every present condition must hold
/// for an event to be delivered; an empty list disables that condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionFilters {
  /// Matches when any affected date falls inside the range.
  pub date_range:    Option<DateRange>,
  pub content_types: Vec<ContentType>,
  pub campaign_ids:  Vec<String>,
  /// Matches items carrying at least one of these tags.
  pub tags:          Vec<String>,
}

impl SubscriptionFilters {
  pub fn validate(&self) -> Result<()> {
    match self.date_range {
      Some(range) if range.start > range.end => Err(Error::InvalidSubscription(
        format!("date range starts after it ends ({} > {})", range.start, range.end),
      )),
      _ => Ok(()),
    }
  }

  /// The item-level part of these filters, for querying the store.
  pub fn item_filters(&self) -> ItemFilters {
    ItemFilters {
      content_types: self.content_types.clone(),
      campaign_ids: self.campaign_ids.clone(),
      tags: self.tags.clone(),
      ..ItemFilters::default()
    }
  }

  pub fn has_item_conditions(&self) -> bool {
    !(self.content_types.is_empty()
      && self.campaign_ids.is_empty()
      && self.tags.is_empty())
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSubscription {
  pub connection_id: ConnectionId,
  pub account_id:    String,
  pub filters:       SubscriptionFilters,
  pub subscribed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
  subscriptions: RwLock<HashMap<ConnectionId, CalendarSubscription>>,
}

impl SubscriptionRegistry {
  pub fn new() -> Self { Self::default() }

  /// Install `subscription`, returning the one it replaced.
  pub fn subscribe(
    &self,
    subscription: CalendarSubscription,
  ) -> Option<CalendarSubscription> {
    self
      .subscriptions
      .write()
      .insert(subscription.connection_id, subscription)
  }

  /// Returns whether a subscription existed.
  pub fn unsubscribe(&self, connection: ConnectionId) -> bool {
    self.subscriptions.write().remove(&connection).is_some()
  }

  pub fn get(&self, connection: ConnectionId) -> Option<CalendarSubscription> {
    self.subscriptions.read().get(&connection).cloned()
  }

  /// Connections subscribed to `account_id` whose filters accept the event,
  /// as judged by `accepts`.
  pub fn matching(
    &self,
    account_id: &str,
    accepts: impl Fn(&SubscriptionFilters) -> bool,
  ) -> Vec<ConnectionId> {
    self
      .subscriptions
      .read()
      .values()
      .filter(|s| s.account_id == account_id && accepts(&s.filters))
      .map(|s| s.connection_id)
      .collect()
  }

  pub fn list(&self) -> Vec<CalendarSubscription> {
    let mut all: Vec<_> = self.subscriptions.read().values().cloned().collect();
    all.sort_by_key(|s| s.subscribed_at);
    all
  }

  pub fn count_for_account(&self, account_id: &str) -> usize {
    self
      .subscriptions
      .read()
      .values()
      .filter(|s| s.account_id == account_id)
      .count()
  }

  pub fn clear(&self) { self.subscriptions.write().clear(); }

  pub fn len(&self) -> usize { self.subscriptions.read().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn sub(conn: ConnectionId, account: &str) -> CalendarSubscription {
    CalendarSubscription {
      connection_id: conn,
      account_id:    account.into(),
      filters:       SubscriptionFilters::default(),
      subscribed_at: Utc::now(),
    }
  }

  #[test]
  fn resubscribe_replaces() {
    let reg = SubscriptionRegistry::new();
    let conn = ConnectionId::new();
    assert!(reg.subscribe(sub(conn, "acc-1")).is_none());
    let previous = reg.subscribe(sub(conn, "acc-2")).unwrap();
    assert_eq!(previous.account_id, "acc-1");
    assert_eq!(reg.len(), 1);
    assert_eq!(reg.get(conn).unwrap().account_id, "acc-2");
  }

  #[test]
  fn unsubscribe_is_idempotent() {
    let reg = SubscriptionRegistry::new();
    let conn = ConnectionId::new();
    reg.subscribe(sub(conn, "acc-1"));
    assert!(reg.unsubscribe(conn));
    assert!(!reg.unsubscribe(conn));
    assert!(reg.is_empty());
  }

  #[test]
  fn matching_is_scoped_to_the_account() {
    let reg = SubscriptionRegistry::new();
    let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
    reg.subscribe(sub(a, "acc-1"));
    reg.subscribe(sub(b, "acc-1"));
    reg.subscribe(sub(c, "acc-2"));

    let mut hits = reg.matching("acc-1", |_| true);
    hits.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(hits, expected);
    assert!(reg.matching("acc-1", |_| false).is_empty());
    assert_eq!(reg.count_for_account("acc-2"), 1);
  }

  #[test]
  fn inverted_range_is_rejected() {
    let filters = SubscriptionFilters {
      date_range: Some(DateRange {
        start: Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap(),
        end:   Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
      }),
      ..Default::default()
    };
    assert!(matches!(filters.validate(), Err(Error::InvalidSubscription(_))));
    assert!(SubscriptionFilters::default().validate().is_ok());
  }
}
