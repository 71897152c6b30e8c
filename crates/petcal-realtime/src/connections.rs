//! The connection registry: one [`ConnectedClient`] per open transport.
//!
//! The registry never hands out its map. Senders are cloned out under the
//! read lock and used after it is released, so a slow or dead connection
//! cannot stall anyone holding the lock.

use std::{collections::HashMap, fmt, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{Envelope, ServerMessage};

/// The outbound half of a connection.
pub type Outbound = mpsc::UnboundedSender<Envelope<ServerMessage>>;

// ─── Identity and state ──────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
  /// A fresh random (v4) identity.
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for ConnectionId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for ConnectionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
  /// Accepted but not yet associated with an account.
  Connected,
  /// Bound to an account by a successful `subscribe`. The binding survives
  /// `unsubscribe`.
  Subscribed { account_id: String, user_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMetadata {
  pub remote_addr: Option<String>,
  pub user_agent:  Option<String>,
}

// ─── Clients ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ConnectedClient {
  pub id:            ConnectionId,
  pub state:         ConnectionState,
  pub connected_at:  DateTime<Utc>,
  pub last_activity: DateTime<Utc>,
  pub metadata:      ConnectionMetadata,
  sender:            Outbound,
}

impl ConnectedClient {
  pub fn is_open(&self) -> bool { !self.sender.is_closed() }

  /// Stamp `message` with this client's id and queue it. Returns `false`
  /// if the transport has gone away.
  pub fn send(&self, message: ServerMessage, request_id: Option<String>) -> bool {
    deliver(&self.sender, self.id, message, request_id)
  }

  pub fn info(&self) -> ClientInfo {
    let (state, account_id, user_id) = match &self.state {
      ConnectionState::Connected => ("connected", None, None),
      ConnectionState::Subscribed { account_id, user_id } => {
        ("subscribed", Some(account_id.clone()), Some(user_id.clone()))
      }
    };
    ClientInfo {
      id: self.id,
      state,
      account_id,
      user_id,
      connected_at: self.connected_at,
      last_activity: self.last_activity,
      metadata: self.metadata.clone(),
      open: self.is_open(),
    }
  }
}

pub(crate) fn deliver(
  sender: &Outbound,
  id: ConnectionId,
  message: ServerMessage,
  request_id: Option<String>,
) -> bool {
  let envelope = Envelope::new(message)
    .with_client_id(id.to_string())
    .with_request_id(request_id);
  sender.send(envelope).is_ok()
}

/// A read-only view of a client for introspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
  pub id:            ConnectionId,
  pub state:         &'static str,
  pub account_id:    Option<String>,
  pub user_id:       Option<String>,
  pub connected_at:  DateTime<Utc>,
  pub last_activity: DateTime<Utc>,
  pub metadata:      ConnectionMetadata,
  pub open:          bool,
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
  clients: RwLock<HashMap<ConnectionId, ConnectedClient>>,
}

impl ConnectionRegistry {
  pub fn new() -> Self { Self::default() }

  pub fn register(&self, metadata: ConnectionMetadata, sender: Outbound) -> ConnectionId {
    let id = ConnectionId::new();
    let now = Utc::now();
    self.clients.write().insert(id, ConnectedClient {
      id,
      state: ConnectionState::Connected,
      connected_at: now,
      last_activity: now,
      metadata,
      sender,
    });
    id
  }

  /// Record inbound activity. Returns `false` for unknown connections.
  pub fn touch(&self, id: ConnectionId) -> bool {
    self.touch_at(id, Utc::now())
  }

  pub fn touch_at(&self, id: ConnectionId, at: DateTime<Utc>) -> bool {
    match self.clients.write().get_mut(&id) {
      Some(client) => {
        client.last_activity = client.last_activity.max(at);
        true
      }
      None => false,
    }
  }

  pub fn bind(&self, id: ConnectionId, account_id: &str, user_id: &str) -> bool {
    match self.clients.write().get_mut(&id) {
      Some(client) => {
        client.state = ConnectionState::Subscribed {
          account_id: account_id.to_owned(),
          user_id:    user_id.to_owned(),
        };
        true
      }
      None => false,
    }
  }

  pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
    self.clients.read().get(&id).map(|c| c.state.clone())
  }

  pub fn info(&self, id: ConnectionId) -> Option<ClientInfo> {
    self.clients.read().get(&id).map(ConnectedClient::info)
  }

  pub fn remove(&self, id: ConnectionId) -> Option<ConnectedClient> {
    self.clients.write().remove(&id)
  }

  /// Every client, leaving the registry empty.
  pub fn drain(&self) -> Vec<ConnectedClient> {
    self.clients.write().drain().map(|(_, c)| c).collect()
  }

  /// Queue a message for one connection. Returns `false` if the connection
  /// is unknown or its transport has closed.
  pub fn send(
    &self,
    id: ConnectionId,
    message: ServerMessage,
    request_id: Option<String>,
  ) -> bool {
    let Some(sender) = self.sender(id) else {
      return false;
    };
    deliver(&sender, id, message, request_id)
  }

  pub fn sender(&self, id: ConnectionId) -> Option<Outbound> {
    self.clients.read().get(&id).map(|c| c.sender.clone())
  }

  /// Senders for every registered connection.
  pub fn senders(&self) -> Vec<(ConnectionId, Outbound)> {
    self
      .clients
      .read()
      .values()
      .map(|c| (c.id, c.sender.clone()))
      .collect()
  }

  /// Connections idle for longer than `threshold` as of `now`, or whose
  /// transport has closed.
  pub fn stale(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<ConnectionId> {
    let cutoff = chrono::Duration::from_std(threshold)
      .ok()
      .and_then(|t| now.checked_sub_signed(t));
    self
      .clients
      .read()
      .values()
      .filter(|c| !c.is_open() || cutoff.is_some_and(|cut| c.last_activity < cut))
      .map(|c| c.id)
      .collect()
  }

  pub fn list(&self) -> Vec<ClientInfo> {
    let mut all: Vec<_> = self.clients.read().values().map(ConnectedClient::info).collect();
    all.sort_by_key(|c| c.connected_at);
    all
  }

  pub fn for_account(&self, account_id: &str) -> Vec<ClientInfo> {
    self
      .list()
      .into_iter()
      .filter(|c| c.account_id.as_deref() == Some(account_id))
      .collect()
  }

  pub fn len(&self) -> usize { self.clients.read().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
