//! Integration tests for `MemoryStore`.

use std::{
  collections::HashSet,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::{DateTime, Duration, TimeZone as _, Utc};
use petcal_core::{
  item::{ContentType, ItemPatch, NewCalendarItem, Priority},
  query::{ItemFilters, Pagination, SortField, SortOrder},
  status::ItemStatus,
  store::CalendarStore,
  version::{CalendarEventVersion, OperationType},
};
use uuid::Uuid;

use crate::{AuditError, AuditSink, Error, MemoryAuditLog, MemoryStore};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

fn post(account: &str, title: &str, content_type: ContentType, day: u32) -> NewCalendarItem {
  NewCalendarItem::new(account, "user-1", title, content_type, at(day, 10))
}

/// A sink that rejects every write, counting the attempts.
#[derive(Default)]
struct FailingAudit {
  attempts: AtomicUsize,
}

impl AuditSink for FailingAudit {
  fn append(&self, version: CalendarEventVersion) -> Result<(), AuditError> {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    Err(AuditError::Rejected {
      version_id: version.version_id,
      reason:     "disk full".into(),
    })
  }

  fn history(&self, _: &str, _: Uuid) -> Result<Vec<CalendarEventVersion>, AuditError> {
    Err(AuditError::Unavailable("disk full".into()))
  }
}

// ─── CRUD ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_assigns_identity_and_timestamps() {
  let s = MemoryStore::new();
  let item = s
    .create(post("acc-1", "Post A", ContentType::Educativo, 1))
    .await
    .unwrap();

  assert_eq!(item.account_id, "acc-1");
  assert_eq!(item.status, ItemStatus::Draft);
  assert_eq!(item.created_at, item.updated_at);

  let fetched = s.get_by_id(item.id, "acc-1").await.unwrap().unwrap();
  assert_eq!(fetched, item);
}

#[tokio::test]
async fn create_rejects_invalid_input() {
  let s = MemoryStore::new();

  let mut bad_tz = post("acc-1", "Post", ContentType::Educativo, 1);
  bad_tz.timezone = "Nowhere/Land".into();
  assert!(matches!(
    s.create(bad_tz).await,
    Err(Error::Core(petcal_core::Error::InvalidTimezone(_)))
  ));

  let mut published = post("acc-1", "Post", ContentType::Educativo, 1);
  published.status = ItemStatus::Published;
  assert!(s.create(published).await.is_err());

  let page = s
    .query("acc-1", &ItemFilters::default(), Pagination::default())
    .await
    .unwrap();
  assert_eq!(page.total, 0);
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = MemoryStore::new();
  assert!(s.get_by_id(Uuid::new_v4(), "acc-1").await.unwrap().is_none());
}

#[tokio::test]
async fn update_merges_and_refreshes_updated_at() {
  let s = MemoryStore::new();
  let item = s
    .create(post("acc-1", "Post A", ContentType::Educativo, 1))
    .await
    .unwrap();

  let updated = s
    .update(
      item.id,
      "acc-1",
      ItemPatch {
        title: Some("Post A (v2)".into()),
        status: Some(ItemStatus::Scheduled),
        ..ItemPatch::default()
      },
    )
    .await
    .unwrap()
    .unwrap();

  assert_eq!(updated.title, "Post A (v2)");
  assert_eq!(updated.status, ItemStatus::Scheduled);
  assert_eq!(updated.created_at, item.created_at);
  assert!(updated.updated_at >= item.updated_at);
}

#[tokio::test]
async fn update_missing_returns_none() {
  let s = MemoryStore::new();
  let res = s
    .update(Uuid::new_v4(), "acc-1", ItemPatch::default())
    .await
    .unwrap();
  assert!(res.is_none());
}

#[tokio::test]
async fn illegal_transition_is_rejected_without_side_effects() {
  let s = MemoryStore::new();
  let item = s
    .create(post("acc-1", "Post A", ContentType::Educativo, 1))
    .await
    .unwrap();

  let err = s
    .update(
      item.id,
      "acc-1",
      ItemPatch { status: Some(ItemStatus::Published), ..ItemPatch::default() },
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(petcal_core::Error::InvalidTransition {
      from: ItemStatus::Draft,
      to:   ItemStatus::Published,
    })
  ));

  let stored = s.get_by_id(item.id, "acc-1").await.unwrap().unwrap();
  assert_eq!(stored, item);
  let history = s.get_version_history(item.id, "acc-1").await.unwrap();
  assert_eq!(history.len(), 1, "only the INSERT version");
}

#[tokio::test]
async fn delete_removes_and_reports() {
  let s = MemoryStore::new();
  let item = s
    .create(post("acc-1", "Post A", ContentType::Educativo, 1))
    .await
    .unwrap();

  assert!(s.delete(item.id, "acc-1").await.unwrap());
  assert!(s.get_by_id(item.id, "acc-1").await.unwrap().is_none());
  assert!(!s.delete(item.id, "acc-1").await.unwrap());
}

// ─── Tenant isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn accounts_never_see_each_other() {
  let s = MemoryStore::new();
  let a = s
    .create(post("acc-a", "Para perros", ContentType::Educativo, 1))
    .await
    .unwrap();
  let b = s
    .create(post("acc-b", "Para gatos", ContentType::Educativo, 1))
    .await
    .unwrap();

  assert!(s.get_by_id(b.id, "acc-a").await.unwrap().is_none());
  assert!(s.get_by_id(a.id, "acc-b").await.unwrap().is_none());

  let page = s
    .query("acc-a", &ItemFilters::default(), Pagination::unbounded())
    .await
    .unwrap();
  assert_eq!(page.items.iter().map(|i| i.id).collect::<Vec<_>>(), [a.id]);

  // Cross-account writes behave as if the item did not exist.
  assert!(s.update(a.id, "acc-b", ItemPatch::default()).await.unwrap().is_none());
  assert!(!s.delete(a.id, "acc-b").await.unwrap());
  assert!(s.move_item(a.id, "acc-b", at(9, 9)).await.unwrap().is_none());
  assert!(s.get_version_history(a.id, "acc-b").await.unwrap().is_empty());
  assert!(s.get_by_id(a.id, "acc-a").await.unwrap().is_some());
}

// ─── Versioning ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_mutation_appends_one_version() {
  let s = MemoryStore::new();
  let created = s
    .create(post("acc-1", "Post A", ContentType::Educativo, 1))
    .await
    .unwrap();

  let history = s.get_version_history(created.id, "acc-1").await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].operation_type, OperationType::Insert);
  assert_eq!(history[0].snapshot, created);
  assert_eq!(history[0].versioned_by, "user-1");

  let updated = s
    .update(
      created.id,
      "acc-1",
      ItemPatch { priority: Some(Priority::High), ..ItemPatch::default() },
    )
    .await
    .unwrap()
    .unwrap();

  let history = s.get_version_history(created.id, "acc-1").await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].operation_type, OperationType::Update);
  // The UPDATE snapshot is the pre-update state.
  assert_eq!(history[0].snapshot, created);

  assert!(s.delete(created.id, "acc-1").await.unwrap());

  let history = s.get_version_history(created.id, "acc-1").await.unwrap();
  assert_eq!(
    history.iter().map(|v| v.operation_type).collect::<Vec<_>>(),
    [OperationType::Delete, OperationType::Update, OperationType::Insert]
  );
  assert_eq!(history[0].snapshot, updated);
  assert!(history.windows(2).all(|w| w[0].versioned_at >= w[1].versioned_at));
}

#[tokio::test]
async fn failing_audit_sink_never_blocks_mutations() {
  let audit = Arc::new(FailingAudit::default());
  let s = MemoryStore::with_audit_sink(audit.clone());

  let item = s
    .create(post("acc-1", "Post A", ContentType::Educativo, 1))
    .await
    .unwrap();
  assert!(s.get_by_id(item.id, "acc-1").await.unwrap().is_some());

  let updated = s
    .update(
      item.id,
      "acc-1",
      ItemPatch { title: Some("Renamed".into()), ..ItemPatch::default() },
    )
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.title, "Renamed");

  assert!(s.delete(item.id, "acc-1").await.unwrap());
  assert!(s.get_by_id(item.id, "acc-1").await.unwrap().is_none());

  assert_eq!(audit.attempts.load(Ordering::SeqCst), 3);
  // History reads do surface the sink failure.
  assert!(matches!(
    s.get_version_history(item.id, "acc-1").await,
    Err(Error::Audit(_))
  ));
}

#[tokio::test]
async fn shared_audit_log_counts_versions() {
  let audit = Arc::new(MemoryAuditLog::new());
  let s = MemoryStore::with_audit_sink(audit.clone());
  assert!(audit.is_empty());

  let item = s
    .create(post("acc-1", "Post A", ContentType::Educativo, 1))
    .await
    .unwrap();
  s.move_item(item.id, "acc-1", at(2, 10)).await.unwrap();
  assert_eq!(audit.len(), 2);
}

// ─── Move ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn move_only_changes_schedule() {
  let s = MemoryStore::new();
  let mut input = post("acc-1", "Post A", ContentType::Promocional, 1);
  input.tags = vec!["gatos".into()];
  input.campaign_id = Some("camp-1".into());
  let item = s.create(input).await.unwrap();

  let moved = s.move_item(item.id, "acc-1", at(5, 18)).await.unwrap().unwrap();

  assert_eq!(moved.scheduled_for, at(5, 18));
  assert!(moved.updated_at >= item.updated_at);
  let mut expected = item.clone();
  expected.scheduled_for = moved.scheduled_for;
  expected.updated_at = moved.updated_at;
  assert_eq!(moved, expected);

  let history = s.get_version_history(item.id, "acc-1").await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].operation_type, OperationType::Update);
  assert_eq!(history[0].snapshot.scheduled_for, at(1, 10));
}

// ─── Query ───────────────────────────────────────────────────────────────────

async fn seeded() -> MemoryStore {
  let s = MemoryStore::new();

  let mut a = post("acc-1", "Cuidado dental canino", ContentType::Educativo, 1);
  a.priority = Priority::Low;
  a.tags = vec!["perros".into(), "salud".into()];
  a.channels = ["instagram".to_owned()].into();
  a.campaign_id = Some("primavera".into());

  let mut b = post("acc-1", "Descuento en alimento", ContentType::Promocional, 3);
  b.priority = Priority::Urgent;
  b.tags = vec!["gatos".into()];
  b.channels = ["newsletter".to_owned(), "facebook".to_owned()].into();
  b.description = Some("Oferta de temporada para gatos".into());

  let mut c = post("acc-1", "Adopta un amigo", ContentType::Testimonial, 5);
  c.priority = Priority::High;
  c.status = ItemStatus::Scheduled;
  c.campaign_id = Some("primavera".into());

  let mut d = post("acc-1", "baño y peluquería", ContentType::Educativo, 7);
  d.priority = Priority::Medium;
  d.tags = vec!["perros".into()];

  for input in [a, b, c, d] {
    s.create(input).await.unwrap();
  }
  s.create(post("acc-2", "Otra cuenta", ContentType::Educativo, 2))
    .await
    .unwrap();
  s
}

async fn titles(s: &MemoryStore, filters: ItemFilters, pagination: Pagination) -> Vec<String> {
  s.query("acc-1", &filters, pagination)
    .await
    .unwrap()
    .items
    .into_iter()
    .map(|i| i.title)
    .collect()
}

#[tokio::test]
async fn filters_compose_conjunctively() {
  let s = seeded().await;
  let all = Pagination::unbounded();

  let educativo = ItemFilters {
    content_types: vec![ContentType::Educativo],
    ..ItemFilters::default()
  };
  assert_eq!(
    titles(&s, educativo.clone(), all).await,
    ["Cuidado dental canino", "baño y peluquería"]
  );

  let educativo_low = ItemFilters { priorities: vec![Priority::Low], ..educativo };
  assert_eq!(titles(&s, educativo_low, all).await, ["Cuidado dental canino"]);

  let by_status = ItemFilters {
    statuses: vec![ItemStatus::Scheduled],
    ..ItemFilters::default()
  };
  assert_eq!(titles(&s, by_status, all).await, ["Adopta un amigo"]);

  let by_campaign = ItemFilters {
    campaign_ids: vec!["primavera".into()],
    ..ItemFilters::default()
  };
  assert_eq!(
    titles(&s, by_campaign, all).await,
    ["Cuidado dental canino", "Adopta un amigo"]
  );

  let by_tag = ItemFilters {
    tags: vec!["gatos".into(), "inexistente".into()],
    ..ItemFilters::default()
  };
  assert_eq!(titles(&s, by_tag, all).await, ["Descuento en alimento"]);

  let by_channel = ItemFilters {
    channels: vec!["instagram".into(), "facebook".into()],
    ..ItemFilters::default()
  };
  assert_eq!(
    titles(&s, by_channel, all).await,
    ["Cuidado dental canino", "Descuento en alimento"]
  );

  let by_range = ItemFilters {
    from: Some(at(3, 10)),
    to: Some(at(5, 10)),
    ..ItemFilters::default()
  };
  assert_eq!(
    titles(&s, by_range, all).await,
    ["Descuento en alimento", "Adopta un amigo"]
  );
}

#[tokio::test]
async fn search_covers_title_and_description_case_insensitively() {
  let s = seeded().await;
  let all = Pagination::unbounded();

  let title = ItemFilters { search: Some("DENTAL".into()), ..ItemFilters::default() };
  assert_eq!(titles(&s, title, all).await, ["Cuidado dental canino"]);

  let description = ItemFilters { search: Some("temporada".into()), ..ItemFilters::default() };
  assert_eq!(titles(&s, description, all).await, ["Descuento en alimento"]);
}

#[tokio::test]
async fn priority_sorts_by_severity() {
  let s = seeded().await;
  let desc = Pagination::unbounded().sorted(SortField::Priority, SortOrder::Desc);
  assert_eq!(
    titles(&s, ItemFilters::default(), desc).await,
    [
      "Descuento en alimento",
      "Adopta un amigo",
      "baño y peluquería",
      "Cuidado dental canino",
    ]
  );
}

#[tokio::test]
async fn title_sort_ignores_case() {
  let s = seeded().await;
  let asc = Pagination::unbounded().sorted(SortField::Title, SortOrder::Asc);
  assert_eq!(
    titles(&s, ItemFilters::default(), asc).await,
    [
      "Adopta un amigo",
      "baño y peluquería",
      "Cuidado dental canino",
      "Descuento en alimento",
    ]
  );
}

#[tokio::test]
async fn pages_cover_every_item_exactly_once() {
  let s = MemoryStore::new();
  let base = at(1, 0);
  for n in 0..23 {
    let mut input = post("acc-1", &format!("Post {n}"), ContentType::Educativo, 1);
    // Several items share a timestamp so the id tie-break matters.
    input.scheduled_for = base + Duration::hours(n / 3);
    s.create(input).await.unwrap();
  }

  for limit in [1, 4, 5, 23, 50] {
    let first = s
      .query("acc-1", &ItemFilters::default(), Pagination::new(1, limit))
      .await
      .unwrap();
    assert_eq!(first.total, 23);
    assert_eq!(first.total_pages, 23usize.div_ceil(limit));

    let mut seen = Vec::new();
    for page in 1..=first.total_pages {
      let p = s
        .query("acc-1", &ItemFilters::default(), Pagination::new(page, limit))
        .await
        .unwrap();
      assert_eq!(p.page, page);
      seen.extend(p.items.into_iter().map(|i| i.id));
    }
    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(seen.len(), 23, "limit {limit}");
    assert_eq!(unique.len(), 23, "limit {limit}");
  }
}

#[tokio::test]
async fn date_range_is_inclusive_and_ordered() {
  let s = seeded().await;
  let items = s
    .get_by_date_range("acc-1", at(1, 10), at(5, 10), &ItemFilters::default())
    .await
    .unwrap();
  assert_eq!(
    items.iter().map(|i| i.title.as_str()).collect::<Vec<_>>(),
    ["Cuidado dental canino", "Descuento en alimento", "Adopta un amigo"]
  );

  let filtered = s
    .get_by_date_range(
      "acc-1",
      at(1, 0),
      at(31, 0),
      &ItemFilters { tags: vec!["perros".into()], ..ItemFilters::default() },
    )
    .await
    .unwrap();
  assert_eq!(filtered.len(), 2);
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_across_accounts() {
  let audit = Arc::new(MemoryAuditLog::new());
  let s = MemoryStore::with_audit_sink(audit.clone());

  let mut handles = Vec::new();
  for writer in 0..8 {
    let s = s.clone();
    handles.push(tokio::spawn(async move {
      let account = format!("acc-{}", writer % 2);
      for n in 0..25 {
        let item = s
          .create(post(&account, &format!("w{writer}-{n}"), ContentType::Informativo, 1))
          .await
          .unwrap();
        s.move_item(item.id, &account, at(2, 12)).await.unwrap().unwrap();
      }
    }));
  }
  for h in handles {
    h.await.unwrap();
  }

  for account in ["acc-0", "acc-1"] {
    let page = s
      .query(account, &ItemFilters::default(), Pagination::new(1, 10))
      .await
      .unwrap();
    assert_eq!(page.total, 100);
  }
  assert_eq!(audit.len(), 400);
}
