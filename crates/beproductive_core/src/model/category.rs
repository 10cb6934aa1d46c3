//! Category records used to group items.

use crate::config::{FeatureKind, LOCAL_RECORD_SUFFIX};
use crate::model::item::ItemValidationError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CATEGORY_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _-]{0,31}$").expect("valid category name regex")
});

/// Persisted category record (one local file per category).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

/// Validates a category name and returns it trimmed.
pub fn normalize_category_name(name: &str) -> Result<String, ItemValidationError> {
    let trimmed = name.trim();
    if CATEGORY_NAME_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ItemValidationError::InvalidCategory(name.to_string()))
    }
}

/// Identity of a category name. Names differing only in case or in
/// space/underscore are the same category.
pub fn category_key(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Whether an item tagged `tag` belongs to the category `name`.
pub fn same_category(tag: &str, name: &str) -> bool {
    category_key(tag) == category_key(name)
}

/// File name for a category record, one file per `category_key`.
pub fn category_file_name(feature: FeatureKind, name: &str) -> String {
    format!(
        "{}{}{}",
        feature.category_file_prefix(),
        category_key(name),
        LOCAL_RECORD_SUFFIX
    )
}
