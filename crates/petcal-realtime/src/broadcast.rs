//! Fan-out of calendar events to matching subscribers.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
  connections::ConnectionId,
  hub::Hub,
  protocol::{CalendarUpdateEvent, ServerMessage},
  subscriptions::SubscriptionFilters,
};

/// Whether a subscriber with `filters` should receive `event`.
///
/// The date range matches when any affected date falls inside it. Item
/// conditions (content type, campaign, tags) are judged against the event's
/// item; an event without an item fails any non-empty item condition.
pub fn accepts(filters: &SubscriptionFilters, event: &CalendarUpdateEvent) -> bool {
  if let Some(range) = filters.date_range
    && !event.affected_dates.iter().any(|d| range.contains(*d))
  {
    return false;
  }
  if !filters.has_item_conditions() {
    return true;
  }
  let Some(item) = &event.item else {
    return false;
  };
  (filters.content_types.is_empty() || filters.content_types.contains(&item.content_type))
    && (filters.campaign_ids.is_empty()
      || item
        .campaign_id
        .as_ref()
        .is_some_and(|c| filters.campaign_ids.contains(c)))
    && (filters.tags.is_empty() || item.has_any_tag(filters.tags.iter()))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
  pub delivered: usize,
  /// Recipients whose transport was gone; they have been disconnected.
  pub dropped:   Vec<ConnectionId>,
}

#[derive(Debug, Clone)]
pub struct BroadcastRouter {
  hub: Arc<Hub>,
}

impl BroadcastRouter {
  pub fn new(hub: Arc<Hub>) -> Self { Self { hub } }

  /// Subscribers of the event's account whose filters accept it, minus the
  /// originator.
  pub fn recipients(
    &self,
    event: &CalendarUpdateEvent,
    originator: Option<ConnectionId>,
  ) -> Vec<ConnectionId> {
    self
      .hub
      .subscriptions
      .matching(&event.account_id, |filters| accepts(filters, event))
      .into_iter()
      .filter(|id| Some(*id) != originator)
      .collect()
  }

  /// Deliver `event` at most once to every recipient. A failed send drops
  /// that connection and does not affect the others.
  pub fn broadcast(
    &self,
    event: &CalendarUpdateEvent,
    originator: Option<ConnectionId>,
  ) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for id in self.recipients(event, originator) {
      let message = ServerMessage::CalendarUpdate(event.clone());
      if self.hub.connections.send(id, message, None) {
        report.delivered += 1;
      } else {
        warn!(connection_id = %id, "broadcast send failed; dropping connection");
        self.hub.disconnect(id, "send failed");
        report.dropped.push(id);
      }
    }
    debug!(
      account_id = %event.account_id,
      operation = %event.operation,
      delivered = report.delivered,
      dropped = report.dropped.len(),
      "broadcast calendar update"
    );
    report
  }
}
