//! Error types for `petcal-realtime`.
//!
//! Every [`Error`] that reaches a client is rendered as an `error` envelope
//! carrying the stable [`ErrorCode`] from [`Error::code`].

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::ProtocolError;

/// Machine-readable error category sent to clients.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
  Protocol,
  Validation,
  NotSubscribed,
  NotFound,
  Store,
  Shutdown,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Protocol(#[from] ProtocolError),

  #[error("invalid subscription: {0}")]
  InvalidSubscription(String),

  #[error("connection must subscribe before sending {0}")]
  NotSubscribed(&'static str),

  #[error(transparent)]
  Invalid(#[from] petcal_core::Error),

  #[error("calendar item {0} not found")]
  ItemNotFound(Uuid),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("server is shutting down")]
  ShuttingDown,
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub fn code(&self) -> ErrorCode {
    match self {
      Self::Protocol(_) => ErrorCode::Protocol,
      Self::InvalidSubscription(_) | Self::Invalid(_) => ErrorCode::Validation,
      Self::NotSubscribed(_) => ErrorCode::NotSubscribed,
      Self::ItemNotFound(_) => ErrorCode::NotFound,
      Self::Store(_) => ErrorCode::Store,
      Self::ShuttingDown => ErrorCode::Shutdown,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
