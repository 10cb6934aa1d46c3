//! Item domain model.
//!
//! # Responsibility
//! - Define the store-agnostic record shared by notes and goals.
//! - Provide draft/patch shapes for create and edit use-cases.
//! - Validate titles and payload kinds before any store write.
//!
//! # Invariants
//! - `id` is unique across both stores and owned by exactly one `location`.
//! - New items always start unpinned.
//! - `payload` kind always matches the owning collection's `FeatureKind`.

use crate::config::FeatureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Opaque item identifier. Local ids are `local-<millis>`; remote ids are
/// assigned by the document store.
pub type ItemId = String;

/// Store that currently owns an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Local,
    Remote,
}

impl Location {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature-specific item body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemPayload {
    /// Free-form note text.
    Note { content: String },
    /// Goal target instant; `is_counter` counts up from `date` instead of
    /// counting down to it.
    Goal {
        date: DateTime<Utc>,
        is_counter: bool,
    },
}

impl ItemPayload {
    pub fn feature(&self) -> FeatureKind {
        match self {
            Self::Note { .. } => FeatureKind::Notes,
            Self::Goal { .. } => FeatureKind::Goals,
        }
    }
}

/// Canonical in-memory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub payload: ItemPayload,
    /// Creation/modification instant; the sort key.
    pub timestamp: DateTime<Utc>,
    pub pinned: bool,
    pub location: Location,
    /// Optional owning category, used by cascade delete.
    pub category: Option<String>,
}

impl Item {
    /// Compares content fields only. Ids differ across a location move.
    pub fn content_eq(&self, other: &Item) -> bool {
        self.title == other.title
            && self.payload == other.payload
            && self.pinned == other.pinned
            && self.category == other.category
    }
}

/// User input for a new item. Location is chosen separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub title: String,
    pub payload: ItemPayload,
    pub category: Option<String>,
}

impl ItemDraft {
    pub fn note(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            payload: ItemPayload::Note {
                content: content.into(),
            },
            category: None,
        }
    }

    pub fn goal(title: impl Into<String>, date: DateTime<Utc>, is_counter: bool) -> Self {
        Self {
            title: title.into(),
            payload: ItemPayload::Goal { date, is_counter },
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Partial edit of title/body. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub payload: Option<ItemPayload>,
    /// `Some(None)` clears the category.
    pub category: Option<Option<String>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.payload.is_none() && self.category.is_none()
    }
}

/// Validation failure for item input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    TitleTooShort { min: usize, actual: usize },
    TitleTooLong { max: usize, actual: usize },
    PayloadMismatch { expected: FeatureKind, actual: FeatureKind },
    InvalidCategory(String),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TitleTooShort { min, actual } => {
                write!(f, "title must be at least {min} characters, got {actual}")
            }
            Self::TitleTooLong { max, actual } => {
                write!(f, "title must be at most {max} characters, got {actual}")
            }
            Self::PayloadMismatch { expected, actual } => write!(
                f,
                "payload kind `{}` does not belong to `{}`",
                actual.plural(),
                expected.plural()
            ),
            Self::InvalidCategory(name) => write!(f, "invalid category name `{name}`"),
        }
    }
}

impl Error for ItemValidationError {}

/// Validates title length bounds.
///
/// The lower bound applies to the trimmed title and the upper bound to the
/// raw title, both counted in `char`s.
pub fn validate_title(title: &str, min: usize, max: usize) -> Result<(), ItemValidationError> {
    let trimmed = title.trim().chars().count();
    if trimmed < min {
        return Err(ItemValidationError::TitleTooShort {
            min,
            actual: trimmed,
        });
    }
    let raw = title.chars().count();
    if raw > max {
        return Err(ItemValidationError::TitleTooLong { max, actual: raw });
    }
    Ok(())
}

/// Ensures `payload` belongs to `feature`.
pub fn validate_payload(
    payload: &ItemPayload,
    feature: FeatureKind,
) -> Result<(), ItemValidationError> {
    let actual = payload.feature();
    if actual != feature {
        return Err(ItemValidationError::PayloadMismatch {
            expected: feature,
            actual,
        });
    }
    Ok(())
}
