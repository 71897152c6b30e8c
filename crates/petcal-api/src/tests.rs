//! Router tests against an in-memory store.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode},
};
use chrono::{TimeZone as _, Utc};
use petcal_core::{
  item::{ContentType, ItemPatch, NewCalendarItem, Priority},
  store::CalendarStore,
};
use petcal_store_memory::MemoryStore;
use serde_json::Value;
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::api_router;

async fn seeded() -> (Arc<MemoryStore>, Uuid) {
  let store = Arc::new(MemoryStore::new());
  let mut first = NewCalendarItem::new(
    "acc-1",
    "user-1",
    "Cuidado dental canino",
    ContentType::Educativo,
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
  );
  first.tags = vec!["perros".into()];
  let first = store.create(first).await.unwrap();

  let mut second = NewCalendarItem::new(
    "acc-1",
    "user-1",
    "Descuento en alimento",
    ContentType::Promocional,
    Utc.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap(),
  );
  second.priority = Priority::Urgent;
  store.create(second).await.unwrap();

  (store, first.id)
}

async fn get_json(store: Arc<MemoryStore>, uri: &str) -> (StatusCode, Value) {
  let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
  let resp = api_router(store).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&bytes).unwrap())
}

// ── List ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_returns_a_page() {
  let (store, _) = seeded().await;
  let (status, body) = get_json(store, "/accounts/acc-1/items?limit=1").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total"], 2);
  assert_eq!(body["total_pages"], 2);
  assert_eq!(body["page"], 1);
  assert_eq!(body["items"][0]["title"], "Cuidado dental canino");
}

#[tokio::test]
async fn list_applies_comma_separated_filters_and_sort() {
  let (store, _) = seeded().await;
  let (status, body) = get_json(
    store,
    "/accounts/acc-1/items?content_type=promocional,testimonial&sort_by=priority&sort_order=desc",
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total"], 1);
  assert_eq!(body["items"][0]["priority"], "urgent");
}

#[tokio::test]
async fn list_rejects_unknown_enum_values() {
  let (store, _) = seeded().await;
  let (status, body) = get_json(store, "/accounts/acc-1/items?status=archived").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("status"));
}

#[tokio::test]
async fn other_accounts_see_nothing() {
  let (store, id) = seeded().await;
  let (_, body) = get_json(store.clone(), "/accounts/acc-2/items").await;
  assert_eq!(body["total"], 0);

  let (status, _) = get_json(store, &format!("/accounts/acc-2/items/{id}")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Get one / history ────────────────────────────────────────────────────────

#[tokio::test]
async fn get_one_and_history() {
  let (store, id) = seeded().await;
  store
    .update(
      id,
      "acc-1",
      ItemPatch { title: Some("Higiene dental".into()), ..ItemPatch::default() },
    )
    .await
    .unwrap();

  let (status, item) = get_json(store.clone(), &format!("/accounts/acc-1/items/{id}")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(item["title"], "Higiene dental");

  let (status, history) =
    get_json(store, &format!("/accounts/acc-1/items/{id}/history")).await;
  assert_eq!(status, StatusCode::OK);
  let ops: Vec<&str> = history
    .as_array()
    .unwrap()
    .iter()
    .map(|v| v["operation_type"].as_str().unwrap())
    .collect();
  assert_eq!(ops, ["UPDATE", "INSERT"]);
}

// ── Calendar ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn calendar_returns_range_unpaginated() {
  let (store, _) = seeded().await;
  let (status, body) = get_json(
    store.clone(),
    "/accounts/acc-1/calendar?start=2026-03-01T00:00:00Z&end=2026-03-05T00:00:00Z",
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);

  let (_, filtered) = get_json(
    store,
    "/accounts/acc-1/calendar?start=2026-03-01T00:00:00Z&end=2026-03-31T00:00:00Z&tags=perros",
  )
  .await;
  assert_eq!(filtered[0]["title"], "Cuidado dental canino");
  assert_eq!(filtered.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn calendar_rejects_inverted_range() {
  let (store, _) = seeded().await;
  let (status, _) = get_json(
    store,
    "/accounts/acc-1/calendar?start=2026-03-05T00:00:00Z&end=2026-03-01T00:00:00Z",
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}
