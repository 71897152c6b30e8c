//! [`MemoryStore`]: the in-memory implementation of [`CalendarStore`].

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use petcal_core::{
  item::{CalendarItem, ItemPatch, NewCalendarItem},
  query::{ItemFilters, Page, Pagination},
  store::CalendarStore,
  version::{CalendarEventVersion, OperationType},
};

use crate::{
  Error, Result,
  audit::{AuditSink, MemoryAuditLog},
  sort::sort_items,
};

// ─── Store ───────────────────────────────────────────────────────────────────

type Partition = Arc<RwLock<HashMap<Uuid, CalendarItem>>>;

/// A calendar store held entirely in memory.
///
/// Clones share the same data.
#[derive(Clone)]
pub struct MemoryStore {
  inner: Arc<Inner>,
}

struct Inner {
  /// One partition per account. The outer lock only guards partition
  /// lookup and creation.
  accounts: RwLock<HashMap<String, Partition>>,
  audit:    Arc<dyn AuditSink>,
}

impl Default for MemoryStore {
  fn default() -> Self { Self::new() }
}

impl MemoryStore {
  /// An empty store recording versions to a [`MemoryAuditLog`].
  pub fn new() -> Self { Self::with_audit_sink(Arc::new(MemoryAuditLog::new())) }

  pub fn with_audit_sink(audit: Arc<dyn AuditSink>) -> Self {
    Self {
      inner: Arc::new(Inner { accounts: RwLock::new(HashMap::new()), audit }),
    }
  }

  fn partition(&self, account_id: &str) -> Option<Partition> {
    self.inner.accounts.read().get(account_id).cloned()
  }

  fn partition_or_create(&self, account_id: &str) -> Partition {
    if let Some(p) = self.partition(account_id) {
      return p;
    }
    self
      .inner
      .accounts
      .write()
      .entry(account_id.to_owned())
      .or_default()
      .clone()
  }

  /// Append a version without letting a sink failure escape.
  fn record(&self, version: CalendarEventVersion) {
    let item_id = version.item_id;
    let operation = version.operation_type;
    if let Err(e) = self.inner.audit.append(version) {
      tracing::warn!(
        target: "petcal::audit",
        %item_id,
        %operation,
        error = %e,
        "failed to record calendar version; mutation kept"
      );
    }
  }
}

// ─── CalendarStore impl ──────────────────────────────────────────────────────

impl CalendarStore for MemoryStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn create(&self, input: NewCalendarItem) -> Result<CalendarItem> {
    input.validate()?;

    let item = input.into_item(Uuid::new_v4(), Utc::now());
    let partition = self.partition_or_create(&item.account_id);
    partition.write().insert(item.id, item.clone());

    self.record(CalendarEventVersion::capture(item.clone(), OperationType::Insert));
    tracing::debug!(item_id = %item.id, account_id = %item.account_id, "created calendar item");
    Ok(item)
  }

  async fn update(
    &self,
    id:         Uuid,
    account_id: &str,
    patch:      ItemPatch,
  ) -> Result<Option<CalendarItem>> {
    let Some(partition) = self.partition(account_id) else {
      return Ok(None);
    };

    let (before, after) = {
      let mut items = partition.write();
      let Some(item) = items.get_mut(&id) else {
        return Ok(None);
      };
      let before = item.clone();
      let mut after = item.clone();
      after.apply(patch)?;
      after.updated_at = Utc::now().max(before.updated_at);
      *item = after.clone();
      (before, after)
    };

    self.record(CalendarEventVersion::capture(before, OperationType::Update));
    Ok(Some(after))
  }

  async fn delete(&self, id: Uuid, account_id: &str) -> Result<bool> {
    let Some(partition) = self.partition(account_id) else {
      return Ok(false);
    };

    let removed = partition.write().remove(&id);
    match removed {
      Some(before) => {
        self.record(CalendarEventVersion::capture(before, OperationType::Delete));
        Ok(true)
      }
      None => Ok(false),
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_by_id(&self, id: Uuid, account_id: &str) -> Result<Option<CalendarItem>> {
    let Some(partition) = self.partition(account_id) else {
      return Ok(None);
    };
    let item = partition.read().get(&id).cloned();
    Ok(item)
  }

  async fn query(
    &self,
    account_id: &str,
    filters:    &ItemFilters,
    pagination: Pagination,
  ) -> Result<Page<CalendarItem>> {
    let mut matched: Vec<CalendarItem> = Vec::new();
    if let Some(partition) = self.partition(account_id) {
      let items = partition.read();
      matched.extend(items.values().filter(|i| filters.matches(i)).cloned());
    }
    sort_items(&mut matched, pagination.sort_by, pagination.sort_order);
    Ok(Page::paginate(matched, pagination))
  }

  async fn get_version_history(
    &self,
    item_id:    Uuid,
    account_id: &str,
  ) -> Result<Vec<CalendarEventVersion>> {
    Ok(self.inner.audit.history(account_id, item_id)?)
  }
}
