//! The transport-agnostic sync service.
//!
//! A transport registers each connection with an outbound channel, feeds
//! every inbound text frame to [`SyncService::handle_text`] in arrival
//! order, and calls [`SyncService::disconnect`] when the socket closes.
//! Nothing here knows about WebSockets.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use chrono::Utc;
use petcal_core::{
  item::CalendarItem,
  query::{Pagination, SortField, SortOrder},
  store::CalendarStore,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
  RealtimeConfig,
  broadcast::{BroadcastRouter, DeliveryReport},
  connections::{ConnectionId, ConnectionMetadata, ConnectionState, Outbound},
  error::{Error, ErrorCode, Result},
  hub::Hub,
  protocol::{
    self, CalendarUpdateEvent, CalendarUpdateRequest, ClientMessage, Envelope,
    ProtocolError, ServerMessage, SubscribeAck, SubscribeRequest, UnsubscribeAck,
  },
  subscriptions::{CalendarSubscription, SubscriptionFilters},
};

pub struct SyncService<S> {
  store:         Arc<S>,
  hub:           Arc<Hub>,
  router:        BroadcastRouter,
  config:        RealtimeConfig,
  shutting_down: AtomicBool,
}

impl<S: CalendarStore> SyncService<S> {
  pub fn new(store: Arc<S>, config: RealtimeConfig) -> Self {
    let hub = Arc::new(Hub::new());
    Self {
      store,
      router: BroadcastRouter::new(hub.clone()),
      hub,
      config,
      shutting_down: AtomicBool::new(false),
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn hub(&self) -> &Arc<Hub> { &self.hub }

  pub fn config(&self) -> &RealtimeConfig { &self.config }

  pub fn is_shutting_down(&self) -> bool { self.shutting_down.load(Ordering::Acquire) }

  // ─── Connection lifecycle ─────────────────────────────────────────────────

  /// Register a new connection whose outbound messages go to `sender`.
  pub fn connect(
    &self,
    metadata: ConnectionMetadata,
    sender: Outbound,
  ) -> Result<ConnectionId> {
    if self.is_shutting_down() {
      return Err(Error::ShuttingDown);
    }
    let id = self.hub.connections.register(metadata, sender);
    info!(connection_id = %id, "client connected");
    Ok(id)
  }

  pub fn disconnect(&self, id: ConnectionId, reason: &str) {
    if self.hub.disconnect(id, reason) {
      info!(connection_id = %id, reason, "client disconnected");
    }
  }

  /// Stop accepting connections, tell every client why, and drop them all.
  /// Returns the number of connections closed.
  pub fn shutdown(&self) -> usize {
    if self.shutting_down.swap(true, Ordering::AcqRel) {
      return 0;
    }
    self.hub.subscriptions.clear();
    let clients = self.hub.connections.drain();
    for client in &clients {
      client.send(ServerMessage::error(ErrorCode::Shutdown, Error::ShuttingDown), None);
    }
    info!(closed = clients.len(), "sync service shut down");
    clients.len()
  }

  // ─── Inbound ──────────────────────────────────────────────────────────────

  /// Process one inbound text frame. Every frame counts as activity, even
  /// one that fails to decode. Failures are reported to the sender only.
  #[instrument(skip_all, fields(connection_id = %id))]
  pub async fn handle_text(&self, id: ConnectionId, text: &str) {
    if !self.hub.connections.touch(id) {
      debug!("frame from unregistered connection ignored");
      return;
    }
    if text.len() > self.config.max_message_bytes {
      let too_large = ProtocolError::TooLarge {
        size: text.len(),
        max:  self.config.max_message_bytes,
      };
      self.reply_error(id, too_large.into(), None);
      return;
    }
    match protocol::decode(text) {
      Ok(envelope) => self.handle_message(id, envelope).await,
      Err(e) => self.reply_error(id, e.into(), None),
    }
  }

  /// Dispatch a decoded message.
  pub async fn handle_message(&self, id: ConnectionId, envelope: Envelope<ClientMessage>) {
    let request_id = envelope.request_id;
    let result = match envelope.message {
      ClientMessage::Subscribe(request) => {
        self.subscribe(id, request, request_id.clone()).await
      }
      ClientMessage::Unsubscribe => self.unsubscribe(id, request_id.clone()),
      ClientMessage::CalendarUpdate(request) => {
        self.calendar_update(id, request, request_id.clone()).await
      }
      ClientMessage::Ping(payload) => {
        self.reply(id, ServerMessage::Pong(payload), request_id.clone());
        Ok(())
      }
      ClientMessage::Pong(_) => Ok(()),
    };
    if let Err(e) = result {
      self.reply_error(id, e, request_id);
    }
  }

  async fn subscribe(
    &self,
    id: ConnectionId,
    request: SubscribeRequest,
    request_id: Option<String>,
  ) -> Result<()> {
    let SubscribeRequest { account_id, user_id, filters, initial_load } = request;
    if account_id.trim().is_empty() {
      return Err(Error::InvalidSubscription("accountId is required".into()));
    }
    if user_id.trim().is_empty() {
      return Err(Error::InvalidSubscription("userId is required".into()));
    }
    filters.validate()?;

    if !self.hub.connections.bind(id, &account_id, &user_id) {
      return Ok(());
    }
    let subscribed_at = Utc::now();
    let replaced = self
      .hub
      .subscriptions
      .subscribe(CalendarSubscription {
        connection_id: id,
        account_id: account_id.clone(),
        filters: filters.clone(),
        subscribed_at,
      })
      .is_some();
    info!(connection_id = %id, account_id, replaced, "subscribed");

    let ack = SubscribeAck {
      account_id: account_id.clone(),
      user_id,
      subscribed_at,
      filters: filters.clone(),
    };
    self.reply(id, ServerMessage::Subscribed(ack), request_id.clone());

    if initial_load {
      let items = self.initial_items(&account_id, &filters).await?;
      let event = CalendarUpdateEvent::initial_load(account_id, items);
      self.reply(id, ServerMessage::CalendarUpdate(event), request_id);
    }
    Ok(())
  }

  fn unsubscribe(&self, id: ConnectionId, request_id: Option<String>) -> Result<()> {
    self.binding(id, "unsubscribe")?;
    let unsubscribed = self.hub.subscriptions.unsubscribe(id);
    debug!(connection_id = %id, unsubscribed, "unsubscribed");
    self.reply(id, ServerMessage::Unsubscribed(UnsubscribeAck { unsubscribed }), request_id);
    Ok(())
  }

  async fn calendar_update(
    &self,
    id: ConnectionId,
    request: CalendarUpdateRequest,
    request_id: Option<String>,
  ) -> Result<()> {
    let (account_id, user_id) = self.binding(id, "calendar_update")?;
    let event = self.apply(&account_id, &user_id, request).await?;
    self.reply(id, ServerMessage::CalendarUpdate(event.clone()), request_id);
    self.broadcast(&event, Some(id));
    Ok(())
  }

  // ─── Mutations ────────────────────────────────────────────────────────────

  /// Apply one mutation to the store on behalf of `user_id` and describe it
  /// as an event. No registry lock is held while the store works.
  pub async fn apply(
    &self,
    account_id: &str,
    user_id: &str,
    request: CalendarUpdateRequest,
  ) -> Result<CalendarUpdateEvent> {
    let operation = request.operation();
    let event = match request {
      CalendarUpdateRequest::Create { mut item } => {
        item.account_id = account_id.to_owned();
        item.user_id = user_id.to_owned();
        item.validate()?;
        let created = self.store.create(item).await.map_err(Error::store)?;
        let at = created.scheduled_for;
        CalendarUpdateEvent::for_item(operation, created, vec![at])
      }
      CalendarUpdateRequest::Update { item_id, item: patch } => {
        let before = self.existing(item_id, account_id).await?;
        let mut preview = before.clone();
        preview.apply(patch.clone())?;
        let after = self
          .store
          .update(item_id, account_id, patch)
          .await
          .map_err(Error::store)?
          .ok_or(Error::ItemNotFound(item_id))?;
        let dates = vec![before.scheduled_for, after.scheduled_for];
        CalendarUpdateEvent::for_item(operation, after, dates)
      }
      CalendarUpdateRequest::Move { item_id, scheduled_for } => {
        let before = self.existing(item_id, account_id).await?;
        let after = self
          .store
          .move_item(item_id, account_id, scheduled_for)
          .await
          .map_err(Error::store)?
          .ok_or(Error::ItemNotFound(item_id))?;
        let dates = vec![before.scheduled_for, after.scheduled_for];
        CalendarUpdateEvent::for_item(operation, after, dates)
      }
      CalendarUpdateRequest::Delete { item_id } => {
        let before = self.existing(item_id, account_id).await?;
        if !self.store.delete(item_id, account_id).await.map_err(Error::store)? {
          return Err(Error::ItemNotFound(item_id));
        }
        let at = before.scheduled_for;
        CalendarUpdateEvent::for_item(operation, before, vec![at])
      }
    };
    info!(
      account_id,
      item_id = ?event.item_id,
      operation = %operation,
      "applied calendar update"
    );
    Ok(event)
  }

  /// Fan an event out to matching subscribers, skipping `originator`.
  pub fn broadcast(
    &self,
    event: &CalendarUpdateEvent,
    originator: Option<ConnectionId>,
  ) -> DeliveryReport {
    self.router.broadcast(event, originator)
  }

  // ─── Helpers ──────────────────────────────────────────────────────────────

  fn binding(&self, id: ConnectionId, operation: &'static str) -> Result<(String, String)> {
    match self.hub.connections.state(id) {
      Some(ConnectionState::Subscribed { account_id, user_id }) => Ok((account_id, user_id)),
      _ => Err(Error::NotSubscribed(operation)),
    }
  }

  async fn existing(&self, item_id: Uuid, account_id: &str) -> Result<CalendarItem> {
    self
      .store
      .get_by_id(item_id, account_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ItemNotFound(item_id))
  }

  async fn initial_items(
    &self,
    account_id: &str,
    filters: &SubscriptionFilters,
  ) -> Result<Vec<CalendarItem>> {
    let item_filters = filters.item_filters();
    let items = match filters.date_range {
      Some(range) => {
        self
          .store
          .get_by_date_range(account_id, range.start, range.end, &item_filters)
          .await
      }
      None => {
        let all = Pagination::unbounded().sorted(SortField::ScheduledFor, SortOrder::Asc);
        self.store.query(account_id, &item_filters, all).await.map(|page| page.items)
      }
    };
    items.map_err(Error::store)
  }

  fn reply(&self, id: ConnectionId, message: ServerMessage, request_id: Option<String>) {
    if !self.hub.connections.send(id, message, request_id) {
      self.hub.disconnect(id, "send failed");
    }
  }

  fn reply_error(&self, id: ConnectionId, error: Error, request_id: Option<String>) {
    match error.code() {
      ErrorCode::Store => warn!(connection_id = %id, error = %error, "request failed"),
      _ => debug!(connection_id = %id, error = %error, "request rejected"),
    }
    self.reply(id, ServerMessage::error(error.code(), &error), request_id);
  }
}
