//! Core configuration and per-feature naming.
//!
//! # Responsibility
//! - Hold tier limits and title bounds consumed by policy and services.
//! - Map each feature (notes, goals) to its store naming conventions.
//!
//! # Invariants
//! - `pin_limit` and `free_item_limit` apply to the merged collection, never
//!   to a single store.
//! - `title_min_chars <= title_max_chars`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum number of pinned items across both stores.
pub const PIN_LIMIT: usize = 2;
/// Maximum number of items a non-premium user may create.
pub const FREE_ITEM_LIMIT: usize = 2;
/// Minimum title length (trimmed, in chars).
pub const TITLE_MIN_CHARS: usize = 3;
/// Maximum title length (raw, in chars).
pub const TITLE_MAX_CHARS: usize = 27;

/// Local item ids start with this marker, followed by epoch milliseconds.
pub const LOCAL_ID_PREFIX: &str = "local-";
/// Extension of every persisted local record.
pub const LOCAL_RECORD_SUFFIX: &str = ".json";

/// Feature that owns an item collection.
///
/// Notes and goals share the reconciliation logic; only naming and payload
/// shape differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Notes,
    Goals,
}

impl FeatureKind {
    /// Remote collection holding this feature's documents.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Goals => "goals",
        }
    }

    /// File-name prefix for local item records.
    pub fn item_file_prefix(self) -> &'static str {
        match self {
            Self::Notes => "note-",
            Self::Goals => "goal-",
        }
    }

    /// File-name prefix for local category records.
    pub fn category_file_prefix(self) -> &'static str {
        match self {
            Self::Notes => "category-note-",
            Self::Goals => "category-goal-",
        }
    }

    /// Singular noun used in user-facing messages.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Notes => "note",
            Self::Goals => "goal",
        }
    }

    /// Plural noun used in user-facing messages.
    pub fn plural(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Goals => "goals",
        }
    }
}

/// Tier limits and validation bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub pin_limit: usize,
    pub free_item_limit: usize,
    pub title_min_chars: usize,
    pub title_max_chars: usize,
    /// Unpin everything on load when the session is not premium.
    pub release_pins_on_downgrade: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            pin_limit: PIN_LIMIT,
            free_item_limit: FREE_ITEM_LIMIT,
            title_min_chars: TITLE_MIN_CHARS,
            title_max_chars: TITLE_MAX_CHARS,
            release_pins_on_downgrade: true,
        }
    }
}

/// Configuration parse/validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    InvalidTitleBounds { min: usize, max: usize },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid core config: {err}"),
            Self::InvalidTitleBounds { min, max } => {
                write!(f, "title bounds are inverted: min={min} max={max}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidTitleBounds { .. } => None,
        }
    }
}

impl CoreConfig {
    /// Parses a JSON config document. Missing keys fall back to defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title_min_chars > self.title_max_chars {
            return Err(ConfigError::InvalidTitleBounds {
                min: self.title_min_chars,
                max: self.title_max_chars,
            });
        }
        Ok(())
    }
}
