//! Lifecycle status of a calendar item and its legal transitions.
//!
//! Items move `draft → scheduled → {published, failed, cancelled}`. Setting a
//! status to its current value is a no-op and always allowed. The three
//! outcomes of `scheduled` are terminal.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemStatus {
  #[default]
  Draft,
  Scheduled,
  Published,
  Failed,
  Cancelled,
}

impl ItemStatus {
  /// Whether no further transitions are possible out of this status.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Published | Self::Failed | Self::Cancelled)
  }

  /// Whether a new item may start its life in this status.
  pub fn is_initial(self) -> bool {
    matches!(self, Self::Draft | Self::Scheduled)
  }

  pub fn can_transition_to(self, next: Self) -> bool {
    use ItemStatus::*;
    self == next
      || matches!(
        (self, next),
        (Draft, Scheduled)
          | (Scheduled, Published)
          | (Scheduled, Failed)
          | (Scheduled, Cancelled)
      )
  }

  /// Validate `self → next`, returning [`Error::InvalidTransition`] if the
  /// move is illegal.
  pub fn transition_to(self, next: Self) -> Result<Self> {
    if self.can_transition_to(next) {
      Ok(next)
    } else {
      Err(Error::InvalidTransition { from: self, to: next })
    }
  }
}
