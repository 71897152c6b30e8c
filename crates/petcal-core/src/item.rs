//! Calendar items, the unit of scheduled marketing content.
//!
//! A [`CalendarItem`] is owned by exactly one account. Callers create items
//! from a [`NewCalendarItem`] and edit them with an [`ItemPatch`]; identity and
//! the `created_at`/`updated_at` timestamps are always assigned by the store.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, status::ItemStatus};

// ─── Classification ──────────────────────────────────────────────────────────

/// The editorial classification of a piece of content.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentType {
  Educativo,
  Promocional,
  Entretenimiento,
  Testimonial,
  Estacional,
  Informativo,
}

/// How urgently an item needs attention.
///
/// Sorting by priority uses [`Priority::severity`], not the lexical order of
/// the names.
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
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
  Urgent,
}

impl Priority {
  /// Numeric rank where `urgent > high > medium > low`.
  pub fn severity(self) -> u8 {
    match self {
      Self::Low => 0,
      Self::Medium => 1,
      Self::High => 2,
      Self::Urgent => 3,
    }
  }
}

// ─── CalendarItem ────────────────────────────────────────────────────────────

/// A stored calendar item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarItem {
  pub id:                   Uuid,
  pub account_id:           String,
  /// The user who authored the item.
  pub user_id:              String,
  pub title:                String,
  pub description:          Option<String>,
  pub content_type:         ContentType,
  /// Target publication channels, e.g. `instagram`, `newsletter`.
  pub channels:             BTreeSet<String>,
  pub scheduled_for:        DateTime<Utc>,
  /// IANA zone the item was scheduled in; always present.
  pub timezone:             String,
  pub campaign_id:          Option<String>,
  pub template_id:          Option<String>,
  pub generated_content_id: Option<String>,
  pub status:               ItemStatus,
  pub priority:             Priority,
  /// Free-form objective weights, e.g. `{"awareness": 0.7}`.
  pub objectives:           BTreeMap<String, f64>,
  pub tags:                 Vec<String>,
  pub predicted_engagement: Option<f64>,
  pub predicted_reach:      Option<u64>,
  pub published_at:         Option<DateTime<Utc>>,
  /// Opaque performance snapshot captured after publication.
  pub performance:          Option<serde_json::Value>,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

impl CalendarItem {
  /// Whether any of `tags` is present on this item.
  pub fn has_any_tag<'a>(&self, mut tags: impl Iterator<Item = &'a String>) -> bool {
    tags.any(|t| self.tags.contains(t))
  }

  /// Apply `patch` in place. Validates the status transition and timezone
  /// before touching any field, so a rejected patch leaves `self` unchanged.
  /// Does not refresh `updated_at`; that is the store's job.
  pub fn apply(&mut self, patch: ItemPatch) -> Result<()> {
    let status = patch
      .status
      .map(|next| self.status.transition_to(next))
      .transpose()?;
    if let Some(tz) = &patch.timezone {
      validate_timezone(tz)?;
    }
    if let Some(title) = &patch.title {
      validate_title(title)?;
    }

    let ItemPatch {
      title,
      description,
      content_type,
      channels,
      scheduled_for,
      timezone,
      campaign_id,
      template_id,
      generated_content_id,
      status: _,
      priority,
      objectives,
      tags,
      predicted_engagement,
      predicted_reach,
      published_at,
      performance,
    } = patch;

    if let Some(v) = title { self.title = v; }
    if let Some(v) = description { self.description = Some(v); }
    if let Some(v) = content_type { self.content_type = v; }
    if let Some(v) = channels { self.channels = v; }
    if let Some(v) = scheduled_for { self.scheduled_for = v; }
    if let Some(v) = timezone { self.timezone = v; }
    if let Some(v) = campaign_id { self.campaign_id = Some(v); }
    if let Some(v) = template_id { self.template_id = Some(v); }
    if let Some(v) = generated_content_id { self.generated_content_id = Some(v); }
    if let Some(v) = status { self.status = v; }
    if let Some(v) = priority { self.priority = v; }
    if let Some(v) = objectives { self.objectives = v; }
    if let Some(v) = tags { self.tags = v; }
    if let Some(v) = predicted_engagement { self.predicted_engagement = Some(v); }
    if let Some(v) = predicted_reach { self.predicted_reach = Some(v); }
    if let Some(v) = published_at { self.published_at = Some(v); }
    if let Some(v) = performance { self.performance = Some(v); }

    Ok(())
  }
}

// ─── NewCalendarItem ─────────────────────────────────────────────────────────

/// Input to [`crate::store::CalendarStore::create`].
///
/// `account_id` and `user_id` default to empty when deserialised so that
/// transport layers can fill them from the authenticated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCalendarItem {
  #[serde(default)]
  pub account_id:           String,
  #[serde(default)]
  pub user_id:              String,
  pub title:                String,
  #[serde(default)]
  pub description:          Option<String>,
  pub content_type:         ContentType,
  #[serde(default)]
  pub channels:             BTreeSet<String>,
  pub scheduled_for:        DateTime<Utc>,
  #[serde(default = "default_timezone")]
  pub timezone:             String,
  #[serde(default)]
  pub campaign_id:          Option<String>,
  #[serde(default)]
  pub template_id:          Option<String>,
  #[serde(default)]
  pub generated_content_id: Option<String>,
  #[serde(default)]
  pub status:               ItemStatus,
  #[serde(default)]
  pub priority:             Priority,
  #[serde(default)]
  pub objectives:           BTreeMap<String, f64>,
  #[serde(default)]
  pub tags:                 Vec<String>,
  #[serde(default)]
  pub predicted_engagement: Option<f64>,
  #[serde(default)]
  pub predicted_reach:      Option<u64>,
}

fn default_timezone() -> String { "UTC".to_owned() }

impl NewCalendarItem {
  /// Convenience constructor with all optional fields set to their defaults.
  pub fn new(
    account_id: impl Into<String>,
    user_id: impl Into<String>,
    title: impl Into<String>,
    content_type: ContentType,
    scheduled_for: DateTime<Utc>,
  ) -> Self {
    Self {
      account_id: account_id.into(),
      user_id: user_id.into(),
      title: title.into(),
      description: None,
      content_type,
      channels: BTreeSet::new(),
      scheduled_for,
      timezone: default_timezone(),
      campaign_id: None,
      template_id: None,
      generated_content_id: None,
      status: ItemStatus::default(),
      priority: Priority::default(),
      objectives: BTreeMap::new(),
      tags: Vec::new(),
      predicted_engagement: None,
      predicted_reach: None,
    }
  }

  /// Check every invariant a stored item must satisfy.
  pub fn validate(&self) -> Result<()> {
    if self.account_id.trim().is_empty() {
      return Err(Error::Validation("account_id must not be empty".into()));
    }
    if self.user_id.trim().is_empty() {
      return Err(Error::Validation("user_id must not be empty".into()));
    }
    validate_title(&self.title)?;
    validate_timezone(&self.timezone)?;
    if !self.status.is_initial() {
      return Err(Error::InvalidInitialStatus(self.status));
    }
    Ok(())
  }

  /// Build the stored record. Identity and timestamps come from the caller
  /// (the store).
  pub fn into_item(self, id: Uuid, now: DateTime<Utc>) -> CalendarItem {
    CalendarItem {
      id,
      account_id: self.account_id,
      user_id: self.user_id,
      title: self.title,
      description: self.description,
      content_type: self.content_type,
      channels: self.channels,
      scheduled_for: self.scheduled_for,
      timezone: self.timezone,
      campaign_id: self.campaign_id,
      template_id: self.template_id,
      generated_content_id: self.generated_content_id,
      status: self.status,
      priority: self.priority,
      objectives: self.objectives,
      tags: self.tags,
      predicted_engagement: self.predicted_engagement,
      predicted_reach: self.predicted_reach,
      published_at: None,
      performance: None,
      created_at: now,
      updated_at: now,
    }
  }
}

// ─── ItemPatch ───────────────────────────────────────────────────────────────

/// A partial update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemPatch {
  pub title:                Option<String>,
  pub description:          Option<String>,
  pub content_type:         Option<ContentType>,
  pub channels:             Option<BTreeSet<String>>,
  pub scheduled_for:        Option<DateTime<Utc>>,
  pub timezone:             Option<String>,
  pub campaign_id:          Option<String>,
  pub template_id:          Option<String>,
  pub generated_content_id: Option<String>,
  pub status:               Option<ItemStatus>,
  pub priority:             Option<Priority>,
  pub objectives:           Option<BTreeMap<String, f64>>,
  pub tags:                 Option<Vec<String>>,
  pub predicted_engagement: Option<f64>,
  pub predicted_reach:      Option<u64>,
  pub published_at:         Option<DateTime<Utc>>,
  pub performance:          Option<serde_json::Value>,
}

impl ItemPatch {
  /// A patch that only changes `scheduled_for`.
  pub fn reschedule(to: DateTime<Utc>) -> Self {
    Self { scheduled_for: Some(to), ..Self::default() }
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Reject anything that is not an IANA zone name known to `chrono-tz`.
pub fn validate_timezone(tz: &str) -> Result<()> {
  tz.parse::<chrono_tz::Tz>()
    .map(|_| ())
    .map_err(|_| Error::InvalidTimezone(tz.to_owned()))
}

fn validate_title(title: &str) -> Result<()> {
  if title.trim().is_empty() {
    Err(Error::Validation("title must not be empty".into()))
  } else {
    Ok(())
  }
}
