//! The pair of registries shared by the service, the broadcast router and
//! the liveness monitor.

use serde::Serialize;
use tracing::debug;

use crate::{
  connections::{ClientInfo, ConnectionId, ConnectionRegistry},
  subscriptions::{CalendarSubscription, SubscriptionRegistry},
};

#[derive(Debug, Default)]
pub struct Hub {
  pub connections:   ConnectionRegistry,
  pub subscriptions: SubscriptionRegistry,
}

/// Per-account counts for the management surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
  pub account_id:           String,
  pub connected_clients:    usize,
  pub active_subscriptions: usize,
}

impl Hub {
  pub fn new() -> Self { Self::default() }

  /// Forget a connection and its subscription. Returns whether the
  /// connection was still registered.
  pub fn disconnect(&self, id: ConnectionId, reason: &str) -> bool {
    self.subscriptions.unsubscribe(id);
    let removed = self.connections.remove(id).is_some();
    if removed {
      debug!(connection_id = %id, reason, "connection removed");
    }
    removed
  }

  pub fn clients(&self) -> Vec<ClientInfo> { self.connections.list() }

  pub fn subscriptions(&self) -> Vec<CalendarSubscription> {
    self.subscriptions.list()
  }

  pub fn clients_for_account(&self, account_id: &str) -> Vec<ClientInfo> {
    self.connections.for_account(account_id)
  }

  pub fn account_summary(&self, account_id: &str) -> AccountSummary {
    AccountSummary {
      account_id:           account_id.to_owned(),
      connected_clients:    self.connections.for_account(account_id).len(),
      active_subscriptions: self.subscriptions.count_for_account(account_id),
    }
  }
}
