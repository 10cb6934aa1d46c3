//! Core error taxonomy and user-facing notifications.
//!
//! # Responsibility
//! - Classify every failure a collection operation can surface.
//! - Map each error kind to a human-readable notification.
//!
//! # Invariants
//! - `Tier`, `Capacity`, `PinLimit` and `Validation` are raised before any
//!   store write.
//! - `PartialFailure` always states how many of how many sub-steps failed.

use crate::config::FeatureKind;
use crate::model::item::{ItemId, ItemValidationError};
use crate::model::record::RecordError;
use crate::store::local::LocalStoreError;
use crate::store::remote::RemoteStoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CoreResult<T> = Result<T, CoreError>;

/// Capability reserved for premium users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PremiumFeature {
    RemoteStorage,
    Pinning,
}

/// Multi-step operation that can complete partially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOperation {
    Move,
    Delete,
    Pin,
    CategoryDelete,
}

impl BulkOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Delete => "delete",
            Self::Pin => "pin",
            Self::CategoryDelete => "category_delete",
        }
    }

    fn past_participle(self) -> &'static str {
        match self {
            Self::Move => "moved",
            Self::Delete | Self::CategoryDelete => "deleted",
            Self::Pin => "updated",
        }
    }
}

/// Outcome of an operation where some sub-steps failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFailure {
    pub operation: BulkOperation,
    pub failed: usize,
    pub total: usize,
    pub failed_ids: Vec<ItemId>,
    pub detail: String,
}

/// Error returned by collection operations.
#[derive(Debug)]
pub enum CoreError {
    /// Action requires premium.
    Tier(PremiumFeature),
    /// Creation limit reached.
    Capacity { limit: usize },
    /// Pinning would exceed the pin limit.
    PinLimit { limit: usize },
    NotFound(ItemId),
    Validation(ItemValidationError),
    StoreIo(LocalStoreError),
    Remote(RemoteStoreError),
    /// Stored record could not be encoded/decoded.
    Record(RecordError),
    PartialFailure(PartialFailure),
}

impl CoreError {
    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Tier(_) => "tier_required",
            Self::Capacity { .. } => "capacity_reached",
            Self::PinLimit { .. } => "pin_limit_reached",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_failed",
            Self::StoreIo(_) => "local_store_failed",
            Self::Remote(_) => "remote_store_failed",
            Self::Record(_) => "record_invalid",
            Self::PartialFailure(_) => "partial_failure",
        }
    }

    /// Maps the error to a message for the user.
    pub fn notification(&self, feature: FeatureKind) -> Notification {
        let noun = feature.noun();
        let plural = feature.plural();
        match self {
            Self::Tier(PremiumFeature::Pinning) => Notification::new(
                "Premium Feature",
                "Upgrade to premium to use the pin feature.",
            ),
            Self::Tier(PremiumFeature::RemoteStorage) => Notification::new(
                "Premium Feature",
                "Upgrade to premium to use the cloud feature.",
            ),
            Self::Capacity { .. } => Notification::new(
                "Limit Reached",
                format!("Upgrade to premium to add more {plural}."),
            ),
            Self::PinLimit { .. } => Notification::new(
                "Pin Limit",
                format!("You already reached the maximum number of pinned {plural}."),
            ),
            Self::NotFound(_) => {
                Notification::new("Not Found", format!("This {noun} no longer exists."))
            }
            Self::Validation(err) => Notification::new("Invalid Input", err.to_string()),
            Self::StoreIo(_) | Self::Record(_) => Notification::new(
                "Error",
                format!("An error occurred while saving the {noun} on this device."),
            ),
            Self::Remote(_) => Notification::new(
                "Error",
                format!("An error occurred while syncing the {noun} with the cloud."),
            ),
            Self::PartialFailure(partial) => Notification::new(
                "Partially Completed",
                format!(
                    "{} of {} {} could not be {}. Please retry the remaining ones.",
                    partial.failed,
                    partial.total,
                    if partial.total == 1 { noun } else { plural },
                    partial.operation.past_participle()
                ),
            ),
        }
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tier(PremiumFeature::RemoteStorage) => {
                write!(f, "remote storage requires premium")
            }
            Self::Tier(PremiumFeature::Pinning) => write!(f, "pinning requires premium"),
            Self::Capacity { limit } => write!(f, "item limit of {limit} reached"),
            Self::PinLimit { limit } => write!(f, "pin limit of {limit} reached"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::StoreIo(err) => write!(f, "{err}"),
            Self::Remote(err) => write!(f, "{err}"),
            Self::Record(err) => write!(f, "{err}"),
            Self::PartialFailure(partial) => write!(
                f,
                "{} partially failed: {} of {} failed ({})",
                partial.operation.as_str(),
                partial.failed,
                partial.total,
                partial.detail
            ),
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::StoreIo(err) => Some(err),
            Self::Remote(err) => Some(err),
            Self::Record(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ItemValidationError> for CoreError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<LocalStoreError> for CoreError {
    fn from(value: LocalStoreError) -> Self {
        Self::StoreIo(value)
    }
}

impl From<RemoteStoreError> for CoreError {
    fn from(value: RemoteStoreError) -> Self {
        Self::Remote(value)
    }
}

impl From<RecordError> for CoreError {
    fn from(value: RecordError) -> Self {
        Self::Record(value)
    }
}

/// Human-readable message for one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BulkOperation, CoreError, PartialFailure, PremiumFeature};
    use crate::config::FeatureKind;

    #[test]
    fn partial_failure_notification_counts_failures() {
        let err = CoreError::PartialFailure(PartialFailure {
            operation: BulkOperation::Delete,
            failed: 1,
            total: 3,
            failed_ids: vec!["local-1".to_string()],
            detail: "disk full".to_string(),
        });
        let notification = err.notification(FeatureKind::Goals);
        assert_eq!(
            notification.message,
            "1 of 3 goals could not be deleted. Please retry the remaining ones."
        );
    }

    #[test]
    fn tier_notifications_name_the_feature() {
        let pin = CoreError::Tier(PremiumFeature::Pinning).notification(FeatureKind::Notes);
        assert!(pin.message.contains("pin"));
        let capacity = CoreError::Capacity { limit: 2 }.notification(FeatureKind::Notes);
        assert_eq!(capacity.title, "Limit Reached");
        assert!(capacity.message.ends_with("more notes."));
    }
}
