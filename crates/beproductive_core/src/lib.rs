//! Core domain logic for BeProductive.
//! Reconciles notes and goals kept on the device and in the cloud store into
//! one ordered collection per feature, under the free/premium tier rules.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod policy;
pub mod service;
pub mod store;

pub use auth::AuthContext;
pub use config::{ConfigError, CoreConfig, FeatureKind};
pub use error::{
    BulkOperation, CoreError, CoreResult, Notification, PartialFailure, PremiumFeature,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::category::Category;
pub use model::goal::GoalSpan;
pub use model::item::{
    Item, ItemDraft, ItemId, ItemPatch, ItemPayload, ItemValidationError, Location,
};
pub use policy::tier::{ItemCounts, Limits, TierDecision};
pub use service::collection::{
    BulkReport, CategoryDeleteReport, DeleteReport, ItemCollectionManager, ItemFailure,
    LoadOutcome, LoadWarning,
};
pub use service::selection::{
    ConfirmOutcome, ModeChange, SelectionController, SelectionError, SelectionMode,
    SelectionTarget,
};
pub use store::local::{FsLocalStore, LocalStore, LocalStoreError};
pub use store::remote::{
    LiveQuery, QueryFilter, RemoteDocument, RemoteSnapshot, RemoteStore, RemoteStoreError,
};
pub use store::sqlite_remote::SqliteDocumentStore;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
