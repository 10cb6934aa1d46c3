//! Tier capacity and pin policy.
//!
//! # Responsibility
//! - Decide create/pin/remote permissions from the premium flag and current
//!   counts, with no storage access.
//!
//! # Invariants
//! - Non-premium users can never pin or use the remote store.
//! - Capacity limits creation only; existing items are never affected.
//! - Pin checks count pins across the whole merged collection.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult, PremiumFeature};
use crate::model::item::Location;

/// Counts over the merged collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemCounts {
    pub total: usize,
    pub pinned: usize,
}

/// Limits the policy is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub pin_limit: usize,
    pub free_item_limit: usize,
}

impl From<&CoreConfig> for Limits {
    fn from(config: &CoreConfig) -> Self {
        Self {
            pin_limit: config.pin_limit,
            free_item_limit: config.free_item_limit,
        }
    }
}

/// Permissions for the current tier and counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDecision {
    pub can_create: bool,
    /// Whether one more item may be pinned right now.
    pub can_pin: bool,
    pub can_use_remote: bool,
}

pub fn evaluate(is_premium: bool, counts: ItemCounts, limits: &Limits) -> TierDecision {
    TierDecision {
        can_create: check_create(is_premium, counts, Location::Local, limits).is_ok(),
        can_pin: check_pin(is_premium, counts.pinned, false, limits).is_ok(),
        can_use_remote: check_remote(is_premium).is_ok(),
    }
}

pub fn check_remote(is_premium: bool) -> CoreResult<()> {
    if is_premium {
        Ok(())
    } else {
        Err(CoreError::Tier(PremiumFeature::RemoteStorage))
    }
}

/// Checks whether a new item may be created at `location`.
///
/// The remote tier check runs before the capacity check.
pub fn check_create(
    is_premium: bool,
    counts: ItemCounts,
    location: Location,
    limits: &Limits,
) -> CoreResult<()> {
    if location == Location::Remote {
        check_remote(is_premium)?;
    }
    if !is_premium && counts.total >= limits.free_item_limit {
        return Err(CoreError::Capacity {
            limit: limits.free_item_limit,
        });
    }
    Ok(())
}

/// Checks whether the target may be pinned.
///
/// `pinned_total` counts all pinned items including the target;
/// `target_pinned` tells whether the target is already among them.
pub fn check_pin(
    is_premium: bool,
    pinned_total: usize,
    target_pinned: bool,
    limits: &Limits,
) -> CoreResult<()> {
    if !is_premium {
        return Err(CoreError::Tier(PremiumFeature::Pinning));
    }
    if !target_pinned && pinned_total >= limits.pin_limit {
        return Err(CoreError::PinLimit {
            limit: limits.pin_limit,
        });
    }
    Ok(())
}

/// Toggling a pin off is premium-only as well.
pub fn check_unpin(is_premium: bool) -> CoreResult<()> {
    if is_premium {
        Ok(())
    } else {
        Err(CoreError::Tier(PremiumFeature::Pinning))
    }
}

#[cfg(test)]
mod tests {
    use super::{check_create, check_pin, evaluate, ItemCounts, Limits};
    use crate::error::{CoreError, PremiumFeature};
    use crate::model::item::Location;

    const LIMITS: Limits = Limits {
        pin_limit: 2,
        free_item_limit: 2,
    };

    #[test]
    fn free_tier_is_capped_at_creation() {
        let below = ItemCounts { total: 1, pinned: 0 };
        let at_limit = ItemCounts { total: 2, pinned: 0 };
        assert!(check_create(false, below, Location::Local, &LIMITS).is_ok());
        assert!(matches!(
            check_create(false, at_limit, Location::Local, &LIMITS),
            Err(CoreError::Capacity { limit: 2 })
        ));
        let many = ItemCounts {
            total: 50,
            pinned: 0,
        };
        assert!(check_create(true, many, Location::Remote, &LIMITS).is_ok());
    }

    #[test]
    fn remote_tier_check_precedes_capacity() {
        let at_limit = ItemCounts { total: 2, pinned: 0 };
        assert!(matches!(
            check_create(false, at_limit, Location::Remote, &LIMITS),
            Err(CoreError::Tier(PremiumFeature::RemoteStorage))
        ));
    }

    #[test]
    fn pin_limit_ignores_already_pinned_target() {
        assert!(matches!(
            check_pin(true, 2, false, &LIMITS),
            Err(CoreError::PinLimit { limit: 2 })
        ));
        assert!(check_pin(true, 2, true, &LIMITS).is_ok());
        assert!(matches!(
            check_pin(false, 0, false, &LIMITS),
            Err(CoreError::Tier(PremiumFeature::Pinning))
        ));
    }

    #[test]
    fn evaluate_reports_all_permissions() {
        let decision = evaluate(true, ItemCounts { total: 5, pinned: 2 }, &LIMITS);
        assert!(decision.can_create);
        assert!(!decision.can_pin);
        assert!(decision.can_use_remote);

        let free = evaluate(false, ItemCounts { total: 1, pinned: 0 }, &LIMITS);
        assert!(free.can_create);
        assert!(!free.can_pin);
        assert!(!free.can_use_remote);
    }
}
