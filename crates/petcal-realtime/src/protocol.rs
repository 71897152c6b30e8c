//! Wire envelopes and their JSON codec.
//!
//! Every frame is a JSON object `{type, payload, timestamp, clientId?,
//! requestId?}`. Decoding reads the `type` discriminant first and only then
//! parses `payload` into the matching strongly-typed variant, so a bad
//! payload is reported as a [`ProtocolError`] naming the message type.

use chrono::{DateTime, Utc};
use petcal_core::item::{CalendarItem, ItemPatch, NewCalendarItem};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

use crate::{error::ErrorCode, subscriptions::SubscriptionFilters};

// ─── Message types ───────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
  Subscribe,
  Unsubscribe,
  CalendarUpdate,
  Ping,
  Pong,
  Error,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
  #[error("malformed message: {0}")]
  Malformed(#[source] serde_json::Error),

  #[error("unknown message type: {0:?}")]
  UnknownType(String),

  #[error("message type {0} is not accepted from clients")]
  NotAccepted(MessageType),

  #[error("invalid {kind} payload: {source}")]
  InvalidPayload {
    kind:   MessageType,
    #[source]
    source: serde_json::Error,
  },

  #[error("message of {size} bytes exceeds the {max} byte limit")]
  TooLarge { size: usize, max: usize },
}

// ─── Envelope ────────────────────────────────────────────────────────────────

/// A message plus its routing metadata.
#[derive(Debug, Clone)]
pub struct Envelope<M> {
  pub message:    M,
  pub timestamp:  DateTime<Utc>,
  /// On outbound frames: the recipient's connection id.
  pub client_id:  Option<String>,
  /// Correlates a direct reply with the request that caused it.
  pub request_id: Option<String>,
}

impl<M> Envelope<M> {
  pub fn new(message: M) -> Self {
    Self { message, timestamp: Utc::now(), client_id: None, request_id: None }
  }

  pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
    self.request_id = request_id;
    self
  }

  pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
    self.client_id = Some(client_id.into());
    self
  }
}

// ─── Client → server ─────────────────────────────────────────────────────────

/// A decoded inbound message.
#[derive(Debug, Clone)]
pub enum ClientMessage {
  Subscribe(SubscribeRequest),
  Unsubscribe,
  CalendarUpdate(CalendarUpdateRequest),
  Ping(Value),
  Pong(Value),
}

impl ClientMessage {
  pub fn message_type(&self) -> MessageType {
    match self {
      Self::Subscribe(_) => MessageType::Subscribe,
      Self::Unsubscribe => MessageType::Unsubscribe,
      Self::CalendarUpdate(_) => MessageType::CalendarUpdate,
      Self::Ping(_) => MessageType::Ping,
      Self::Pong(_) => MessageType::Pong,
    }
  }
}

/// Payload of an inbound `subscribe`. Missing ids deserialise as empty and
/// are rejected by validation rather than by the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
  #[serde(default)]
  pub account_id:   String,
  #[serde(default)]
  pub user_id:      String,
  #[serde(default)]
  pub filters:      SubscriptionFilters,
  /// Ask for the current calendar contents right after subscribing.
  #[serde(default)]
  pub initial_load: bool,
}

/// Payload of an inbound `calendar_update`, tagged by `operation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
  tag = "operation",
  rename_all = "snake_case",
  rename_all_fields = "camelCase"
)]
pub enum CalendarUpdateRequest {
  Create { item: NewCalendarItem },
  Update { item_id: Uuid, item: ItemPatch },
  Delete { item_id: Uuid },
  Move { item_id: Uuid, scheduled_for: DateTime<Utc> },
}

impl CalendarUpdateRequest {
  pub fn operation(&self) -> UpdateOperation {
    match self {
      Self::Create { .. } => UpdateOperation::Create,
      Self::Update { .. } => UpdateOperation::Update,
      Self::Delete { .. } => UpdateOperation::Delete,
      Self::Move { .. } => UpdateOperation::Move,
    }
  }
}

// ─── Server → client ─────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpdateOperation {
  Create,
  Update,
  Delete,
  Move,
  InitialLoad,
}

/// The broadcast payload describing one applied mutation (or an initial
/// load). Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarUpdateEvent {
  pub event_type:     MessageType,
  pub account_id:     String,
  pub operation:      UpdateOperation,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub item:           Option<CalendarItem>,
  /// Only set for [`UpdateOperation::InitialLoad`].
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub items:          Option<Vec<CalendarItem>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub item_id:        Option<Uuid>,
  pub affected_dates: Vec<DateTime<Utc>>,
  pub timestamp:      DateTime<Utc>,
}

impl CalendarUpdateEvent {
  /// An event for a single-item mutation. `affected_dates` is deduplicated.
  pub fn for_item(
    operation: UpdateOperation,
    item: CalendarItem,
    mut affected_dates: Vec<DateTime<Utc>>,
  ) -> Self {
    affected_dates.sort();
    affected_dates.dedup();
    Self {
      event_type: MessageType::CalendarUpdate,
      account_id: item.account_id.clone(),
      operation,
      item_id: Some(item.id),
      item: Some(item),
      items: None,
      affected_dates,
      timestamp: Utc::now(),
    }
  }

  pub fn initial_load(account_id: impl Into<String>, items: Vec<CalendarItem>) -> Self {
    let mut affected_dates: Vec<_> = items.iter().map(|i| i.scheduled_for).collect();
    affected_dates.sort();
    affected_dates.dedup();
    Self {
      event_type: MessageType::CalendarUpdate,
      account_id: account_id.into(),
      operation: UpdateOperation::InitialLoad,
      item: None,
      items: Some(items),
      item_id: None,
      affected_dates,
      timestamp: Utc::now(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeAck {
  pub account_id:    String,
  pub user_id:       String,
  pub subscribed_at: DateTime<Utc>,
  pub filters:       SubscriptionFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsubscribeAck {
  /// Whether a subscription existed before this request.
  pub unsubscribed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
  pub error: String,
  pub code:  ErrorCode,
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
  Subscribed(SubscribeAck),
  Unsubscribed(UnsubscribeAck),
  CalendarUpdate(CalendarUpdateEvent),
  Ping(Value),
  Pong(Value),
  Error(ErrorPayload),
}

impl ServerMessage {
  pub fn error(code: ErrorCode, error: impl ToString) -> Self {
    Self::Error(ErrorPayload { error: error.to_string(), code })
  }

  pub fn message_type(&self) -> MessageType {
    match self {
      Self::Subscribed(_) => MessageType::Subscribe,
      Self::Unsubscribed(_) => MessageType::Unsubscribe,
      Self::CalendarUpdate(_) => MessageType::CalendarUpdate,
      Self::Ping(_) => MessageType::Ping,
      Self::Pong(_) => MessageType::Pong,
      Self::Error(_) => MessageType::Error,
    }
  }

  fn payload(&self) -> serde_json::Result<Value> {
    match self {
      Self::Subscribed(ack) => serde_json::to_value(ack),
      Self::Unsubscribed(ack) => serde_json::to_value(ack),
      Self::CalendarUpdate(event) => serde_json::to_value(event),
      Self::Ping(v) | Self::Pong(v) => Ok(v.clone()),
      Self::Error(e) => serde_json::to_value(e),
    }
  }
}

// ─── Codec ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOut<'a> {
  #[serde(rename = "type")]
  kind:       MessageType,
  payload:    Value,
  timestamp:  DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  client_id:  Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  request_id: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIn {
  #[serde(rename = "type")]
  kind:       String,
  #[serde(default)]
  payload:    Value,
  timestamp:  Option<DateTime<Utc>>,
  client_id:  Option<String>,
  request_id: Option<String>,
}

/// Decode one inbound text frame.
pub fn decode(text: &str) -> Result<Envelope<ClientMessage>, ProtocolError> {
  let wire: WireIn = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
  let kind: MessageType = wire
    .kind
    .parse()
    .map_err(|_| ProtocolError::UnknownType(wire.kind.clone()))?;

  let invalid = |source| ProtocolError::InvalidPayload { kind, source };
  let message = match kind {
    MessageType::Subscribe => {
      ClientMessage::Subscribe(serde_json::from_value(wire.payload).map_err(invalid)?)
    }
    MessageType::Unsubscribe => ClientMessage::Unsubscribe,
    MessageType::CalendarUpdate => {
      ClientMessage::CalendarUpdate(serde_json::from_value(wire.payload).map_err(invalid)?)
    }
    MessageType::Ping => ClientMessage::Ping(wire.payload),
    MessageType::Pong => ClientMessage::Pong(wire.payload),
    MessageType::Error => return Err(ProtocolError::NotAccepted(kind)),
  };

  Ok(Envelope {
    message,
    timestamp: wire.timestamp.unwrap_or_else(Utc::now),
    client_id: wire.client_id,
    request_id: wire.request_id,
  })
}

/// Encode one outbound message as a JSON text frame.
pub fn encode(envelope: &Envelope<ServerMessage>) -> serde_json::Result<String> {
  serde_json::to_string(&WireOut {
    kind:       envelope.message.message_type(),
    payload:    envelope.message.payload()?,
    timestamp:  envelope.timestamp,
    client_id:  envelope.client_id.as_deref(),
    request_id: envelope.request_id.as_deref(),
  })
}
