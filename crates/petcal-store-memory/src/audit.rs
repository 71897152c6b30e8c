//! Audit sinks, where [`CalendarEventVersion`]s are appended.
//!
//! The store writes versions on a best-effort basis: an [`AuditSink::append`]
//! failure is logged under the `petcal::audit` target and never surfaces to
//! the caller of the mutation.

use std::collections::HashMap;

use parking_lot::RwLock;
use petcal_core::version::CalendarEventVersion;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuditError {
  #[error("audit sink rejected version {version_id}: {reason}")]
  Rejected { version_id: Uuid, reason: String },

  #[error("audit sink unavailable: {0}")]
  Unavailable(String),
}

/// Append-only destination for versions.
pub trait AuditSink: Send + Sync {
  fn append(&self, version: CalendarEventVersion) -> Result<(), AuditError>;

  /// Versions for one item of one account, newest first.
  fn history(
    &self,
    account_id: &str,
    item_id: Uuid,
  ) -> Result<Vec<CalendarEventVersion>, AuditError>;
}

/// The default sink: versions kept in memory, keyed by account and item.
#[derive(Default)]
pub struct MemoryAuditLog {
  versions: RwLock<HashMap<(String, Uuid), Vec<CalendarEventVersion>>>,
}

impl MemoryAuditLog {
  pub fn new() -> Self { Self::default() }

  /// Total number of versions recorded across all accounts.
  pub fn len(&self) -> usize {
    self.versions.read().values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl AuditSink for MemoryAuditLog {
  fn append(&self, version: CalendarEventVersion) -> Result<(), AuditError> {
    self
      .versions
      .write()
      .entry((version.account_id.clone(), version.item_id))
      .or_default()
      .push(version);
    Ok(())
  }

  fn history(
    &self,
    account_id: &str,
    item_id: Uuid,
  ) -> Result<Vec<CalendarEventVersion>, AuditError> {
    let mut versions = self
      .versions
      .read()
      .get(&(account_id.to_owned(), item_id))
      .cloned()
      .unwrap_or_default();
    // Appended oldest first; reverse before the stable sort so equal
    // timestamps still come out newest first.
    versions.reverse();
    versions.sort_by(|a, b| b.versioned_at.cmp(&a.versioned_at));
    Ok(versions)
  }
}
