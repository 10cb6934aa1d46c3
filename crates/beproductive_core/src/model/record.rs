//! Persisted record shapes for both stores.
//!
//! # Responsibility
//! - Define the one-JSON-object-per-file local record.
//! - Map items to and from remote document fields.
//! - Derive local ids from record file names.
//!
//! # Invariants
//! - Local records carry exactly `title`, `content` or `date`+`isCounter`,
//!   `timestamp`, `pinned` and optional `category`.
//! - Local ids are filesystem-safe (`local-<digits>`).

use crate::config::{FeatureKind, LOCAL_ID_PREFIX, LOCAL_RECORD_SUFFIX};
use crate::model::item::{Item, ItemId, ItemPayload, Location};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

static LOCAL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^local-[0-9]{1,20}$").expect("valid local id regex"));

/// Remote field holding the owning user id.
pub const USER_ID_FIELD: &str = "userId";
/// Remote field holding the pinned flag.
pub const PINNED_FIELD: &str = "pinned";
const CATEGORY_FIELD: &str = "category";

/// Record decode failure.
#[derive(Debug)]
pub enum RecordError {
    Json(serde_json::Error),
    MissingField(&'static str),
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed item record: {err}"),
            Self::MissingField(field) => write!(f, "item record is missing `{field}`"),
        }
    }
}

impl Error for RecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::MissingField(_) => None,
        }
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Wire shape shared by local files and remote documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_counter: Option<bool>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ItemRecord {
    pub fn from_item(item: &Item) -> Self {
        let (content, date, is_counter) = match &item.payload {
            ItemPayload::Note { content } => (Some(content.clone()), None, None),
            ItemPayload::Goal { date, is_counter } => (None, Some(*date), Some(*is_counter)),
        };
        Self {
            title: item.title.clone(),
            content,
            date,
            is_counter,
            timestamp: item.timestamp,
            pinned: item.pinned,
            category: item.category.clone(),
        }
    }

    /// Rebuilds an item for `feature`. Notes tolerate a missing body; goals
    /// require a target date.
    pub fn into_item(
        self,
        id: ItemId,
        location: Location,
        feature: FeatureKind,
    ) -> Result<Item, RecordError> {
        let payload = match feature {
            FeatureKind::Notes => ItemPayload::Note {
                content: self.content.unwrap_or_default(),
            },
            FeatureKind::Goals => ItemPayload::Goal {
                date: self.date.ok_or(RecordError::MissingField("date"))?,
                is_counter: self.is_counter.unwrap_or(false),
            },
        };
        Ok(Item {
            id,
            title: self.title,
            payload,
            timestamp: self.timestamp,
            pinned: self.pinned,
            location,
            category: self.category,
        })
    }

    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Remote document fields, tagged with the owning user.
    pub fn to_document_fields(&self, user_id: &str) -> Result<Map<String, Value>, RecordError> {
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        fields.insert(USER_ID_FIELD.to_string(), Value::String(user_id.to_string()));
        Ok(fields)
    }

    /// Fields for merging into an existing document. A cleared category is
    /// written as `null` so the merge drops the stored value.
    pub fn to_update_fields(&self, user_id: &str) -> Result<Map<String, Value>, RecordError> {
        let mut fields = self.to_document_fields(user_id)?;
        fields.entry(CATEGORY_FIELD).or_insert(Value::Null);
        Ok(fields)
    }

    /// Parses remote document fields. Unknown fields (`userId`) are ignored.
    pub fn from_document_fields(fields: &Map<String, Value>) -> Result<Self, RecordError> {
        Ok(serde_json::from_value(Value::Object(fields.clone()))?)
    }
}

/// Returns the local file name for an item id.
pub fn local_file_name(feature: FeatureKind, id: &str) -> String {
    format!("{}{}{}", feature.item_file_prefix(), id, LOCAL_RECORD_SUFFIX)
}

/// Listing prefix that matches only item records of `feature`.
pub fn local_list_prefix(feature: FeatureKind) -> String {
    format!("{}{}", feature.item_file_prefix(), LOCAL_ID_PREFIX)
}

/// Derives a local id by stripping the feature prefix and record suffix.
///
/// Returns `None` for names that do not belong to this feature or whose
/// remainder is not a valid local id.
pub fn local_id_from_file_name(feature: FeatureKind, file_name: &str) -> Option<ItemId> {
    let id = file_name
        .strip_prefix(feature.item_file_prefix())?
        .strip_suffix(LOCAL_RECORD_SUFFIX)?;
    if is_valid_local_id(id) {
        Some(id.to_string())
    } else {
        None
    }
}

pub fn is_valid_local_id(id: &str) -> bool {
    LOCAL_ID_RE.is_match(id)
}

/// Builds a time-based local id.
pub fn local_id_from_millis(millis: i64) -> ItemId {
    format!("{LOCAL_ID_PREFIX}{millis}")
}
