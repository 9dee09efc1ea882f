//! Domain model and wire DTO for the todo list.
//!
//! # Design
//! `Item` is what the cache stores and the UI reads; `ItemDto` is the wire
//! record with epoch-second timestamps. The two are defined independently of
//! the mock-server crate so integration tests catch schema drift. Conversions
//! are total: an unrecognized importance string degrades to `Normal` and an
//! out-of-range epoch clamps to the Unix epoch rather than failing the whole
//! list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority of an item, ordered `Low < Normal < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Normal,
    High,
}

impl Importance {
    /// The string carried in `ItemDto::importance`.
    pub fn as_str(self) -> &'static str {
        match self {
            Importance::Low => "low",
            Importance::Normal => "normal",
            Importance::High => "high",
        }
    }

    /// Parse a wire string, falling back to `Normal` for anything
    /// unrecognized. The server's vocabulary may grow; one odd item must
    /// not poison a whole list fetch.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "low" => Importance::Low,
            "high" => Importance::High,
            _ => Importance::Normal,
        }
    }
}

impl Default for Importance {
    fn default() -> Self {
        Importance::Normal
    }
}

/// A display grouping for items. Local-only: categories never travel over
/// the wire, so a merge from the server resets an item to [`Category::other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    /// Must be non-empty and unique among categories.
    pub name: String,
    pub color: Option<String>,
}

impl Category {
    /// A user-created category with a fresh id.
    pub fn new(name: impl Into<String>, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            color,
        }
    }

    fn builtin(id: &str, name: &str, color: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: color.map(str::to_string),
        }
    }

    pub fn work() -> Self {
        Self::builtin("work", "Work", Some("#FF3B30"))
    }

    pub fn personal() -> Self {
        Self::builtin("personal", "Personal", Some("#007AFF"))
    }

    pub fn study() -> Self {
        Self::builtin("study", "Study", Some("#33C759"))
    }

    /// The catch-all category items fall into by default.
    pub fn other() -> Self {
        Self::builtin("other", "Other", None)
    }

    /// The built-in set every service starts with.
    pub fn defaults() -> Vec<Self> {
        vec![Self::work(), Self::personal(), Self::study(), Self::other()]
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::other()
    }
}

/// A single todo item as held in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable unique id, client-generated at creation.
    pub id: String,
    pub text: String,
    pub importance: Importance,
    pub deadline: Option<DateTime<Utc>>,
    pub is_done: bool,
    /// Immutable after creation.
    pub date_created: DateTime<Utc>,
    /// Refreshed by every mutation helper; `None` until the first change.
    pub date_changed: Option<DateTime<Utc>>,
    /// Opaque display tag; the sync logic never inspects it.
    pub color: Option<String>,
    #[serde(default)]
    pub category: Category,
}

impl Item {
    /// A fresh item with normal importance and a generated id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            importance: Importance::Normal,
            deadline: None,
            is_done: false,
            date_created: Utc::now(),
            date_changed: None,
            color: None,
            category: Category::other(),
        }
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Copy-on-write mutation helper: returns a new item with `is_done`
    /// replaced (when given) and `date_changed` advanced to now. All other
    /// fields, `date_created` included, are carried over untouched.
    pub fn copy_with(&self, done: Option<bool>) -> Self {
        Self {
            is_done: done.unwrap_or(self.is_done),
            date_changed: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// Convert to the wire record. Total: every item has a representation.
    /// `changed_at` falls back to `created_at` for never-mutated items.
    pub fn to_dto(&self, device_id: &str) -> ItemDto {
        ItemDto {
            id: self.id.clone(),
            text: self.text.clone(),
            importance: self.importance.as_str().to_string(),
            deadline: self.deadline.map(|d| d.timestamp()),
            done: self.is_done,
            color: self.color.clone(),
            created_at: self.date_created.timestamp(),
            changed_at: Some(self.date_changed.unwrap_or(self.date_created).timestamp()),
            last_updated_by: device_id.to_string(),
        }
    }

    /// Materialize an item from a wire record. Never fails: an unrecognized
    /// importance degrades to `Normal` and out-of-range epochs clamp to the
    /// Unix epoch. The category resets to `Other` (categories are local-only).
    pub fn from_dto(dto: &ItemDto) -> Self {
        let created = epoch_to_datetime(dto.created_at);
        let changed = dto.changed_at.unwrap_or(dto.created_at);
        Self {
            id: dto.id.clone(),
            text: dto.text.clone(),
            importance: Importance::from_wire(&dto.importance),
            deadline: dto.deadline.map(epoch_to_datetime),
            is_done: dto.done,
            date_created: created,
            date_changed: Some(epoch_to_datetime(changed)),
            color: dto.color.clone(),
            category: Category::other(),
        }
    }
}

/// The wire representation of an item. All time fields are epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDto {
    pub id: String,
    pub text: String,
    pub importance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: i64,
    /// Optional on decode (defaults to `created_at`); always emitted on
    /// encode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_at: Option<i64>,
    pub last_updated_by: String,
}

fn epoch_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
