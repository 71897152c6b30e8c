//! Error types for `petcal-core`.

use thiserror::Error;

use crate::status::ItemStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("illegal status transition: {from} -> {to}")]
  InvalidTransition { from: ItemStatus, to: ItemStatus },

  #[error("items cannot be created with status {0}")]
  InvalidInitialStatus(ItemStatus),

  #[error("unknown timezone: {0:?}")]
  InvalidTimezone(String),

  #[error("invalid calendar item: {0}")]
  Validation(String),

  #[error("store unavailable: {0}")]
  Unavailable(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
