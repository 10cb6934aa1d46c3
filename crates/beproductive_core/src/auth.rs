//! Session identity and tier.
//!
//! An `AuthContext` is built once per authenticated session and handed to
//! every collection manager of that session; signing out discards both.

use crate::store::remote::{RemoteResult, RemoteStore};
use log::info;

/// Remote collection holding user profile documents.
pub const PROFILE_COLLECTION: &str = "users";
/// Profile field carrying the premium flag.
pub const PREMIUM_FIELD: &str = "isPremium";

/// Read-only identity and tier for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    user_id: Option<String>,
    is_premium: bool,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>, is_premium: bool) -> Self {
        Self {
            user_id: Some(user_id.into()),
            is_premium,
        }
    }

    /// Signed-out session: local-only, non-premium.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Builds a session by reading `users/<user_id>.isPremium`.
    ///
    /// A missing profile or a non-boolean flag yields a non-premium session.
    pub async fn from_profile(remote: &dyn RemoteStore, user_id: &str) -> RemoteResult<Self> {
        let is_premium = remote
            .get_doc(PROFILE_COLLECTION, user_id)
            .await?
            .and_then(|profile| profile.fields.get(PREMIUM_FIELD).and_then(|v| v.as_bool()))
            .unwrap_or(false);
        info!(
            "event=auth_profile module=auth status=ok premium={}",
            is_premium
        );
        Ok(Self::new(user_id, is_premium))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Premium only counts for an authenticated user.
    pub fn is_premium(&self) -> bool {
        self.is_authenticated() && self.is_premium
    }
}
