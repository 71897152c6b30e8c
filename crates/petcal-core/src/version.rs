//! Audit-trail versions.
//!
//! Every create, update and delete appends one immutable
//! [`CalendarEventVersion`]. Versions are never mutated or removed and are
//! never used to serve live reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use uuid::Uuid;

use crate::item::CalendarItem;

/// The mutation that produced a version.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum OperationType {
  Insert,
  Update,
  Delete,
}

/// A snapshot of an item taken at mutation time.
///
/// For `INSERT` the snapshot is the freshly created record; for `UPDATE` and
/// `DELETE` it is the state immediately before the mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventVersion {
  pub version_id:     Uuid,
  pub item_id:        Uuid,
  pub account_id:     String,
  pub snapshot:       CalendarItem,
  pub operation_type: OperationType,
  pub versioned_at:   DateTime<Utc>,
  /// The authoring user of the snapshotted item.
  pub versioned_by:   String,
}

impl CalendarEventVersion {
  pub fn capture(snapshot: CalendarItem, operation_type: OperationType) -> Self {
    Self {
      version_id: Uuid::new_v4(),
      item_id: snapshot.id,
      account_id: snapshot.account_id.clone(),
      versioned_by: snapshot.user_id.clone(),
      snapshot,
      operation_type,
      versioned_at: Utc::now(),
    }
  }
}
