//! Remote document-store contract with live queries.
//!
//! # Responsibility
//! - Define the async `RemoteStore` contract consumed by collection services.
//! - Provide the `LiveQuery` handle through which stores push snapshots.
//!
//! # Invariants
//! - A live query emits full snapshots of its matching documents until it is
//!   unsubscribed or dropped.
//! - Stores never retry on their own; retries are a caller concern.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc;

pub type RemoteResult<T> = Result<T, RemoteStoreError>;

/// Document fields keyed by top-level field name.
pub type DocumentFields = Map<String, Value>;

/// Remote store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStoreError {
    /// Transport failure; the operation may succeed when retried.
    Network(String),
    PermissionDenied(String),
    NotFound { collection: String, doc_id: String },
    InvalidDocument(String),
    /// Store-internal failure (storage engine, serialization).
    Backend(String),
}

impl Display for RemoteStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(message) => write!(f, "remote store unreachable: {message}"),
            Self::PermissionDenied(message) => write!(f, "remote permission denied: {message}"),
            Self::NotFound { collection, doc_id } => {
                write!(f, "remote document not found: {collection}/{doc_id}")
            }
            Self::InvalidDocument(message) => write!(f, "invalid remote document: {message}"),
            Self::Backend(message) => write!(f, "remote store failure: {message}"),
        }
    }
}

impl Error for RemoteStoreError {}

/// One document as delivered by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: String,
    pub fields: DocumentFields,
}

/// Top-level field equality filter.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub field: String,
    pub equals: Value,
}

impl QueryFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            equals: value.into(),
        }
    }

    pub fn matches(&self, fields: &DocumentFields) -> bool {
        fields.get(&self.field) == Some(&self.equals)
    }
}

/// Returns whether `fields` satisfies every filter.
pub fn matches_all(filters: &[QueryFilter], fields: &DocumentFields) -> bool {
    filters.iter().all(|filter| filter.matches(fields))
}

/// Full result set of a live query at one point in time.
pub type RemoteSnapshot = Vec<RemoteDocument>;

/// Store-side end of a live query.
#[derive(Debug, Clone)]
pub struct LiveQuerySender {
    tx: mpsc::UnboundedSender<RemoteResult<RemoteSnapshot>>,
}

impl LiveQuerySender {
    /// Pushes one snapshot. Returns `false` once the subscriber is gone.
    pub fn send(&self, snapshot: RemoteResult<RemoteSnapshot>) -> bool {
        self.tx.send(snapshot).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Subscriber-side handle of a live query.
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct LiveQuery {
    rx: mpsc::UnboundedReceiver<RemoteResult<RemoteSnapshot>>,
}

impl LiveQuery {
    /// Creates a connected sender/handle pair for store implementations.
    pub fn channel() -> (LiveQuerySender, LiveQuery) {
        let (tx, rx) = mpsc::unbounded_channel();
        (LiveQuerySender { tx }, LiveQuery { rx })
    }

    /// Waits for the next snapshot. `None` once the store closed the query.
    pub async fn next(&mut self) -> Option<RemoteResult<RemoteSnapshot>> {
        self.rx.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

/// Document-collection persistence with live-query notifications.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Subscribes to documents of `collection` matching every filter. The
    /// current result set is delivered as the first snapshot.
    async fn query(&self, collection: &str, filters: &[QueryFilter]) -> RemoteResult<LiveQuery>;
    async fn get_doc(&self, collection: &str, doc_id: &str) -> RemoteResult<Option<RemoteDocument>>;
    /// Creates a document with a store-assigned id and returns that id.
    async fn add_doc(&self, collection: &str, fields: DocumentFields) -> RemoteResult<String>;
    /// Creates or replaces a document under a caller-chosen id.
    async fn set_doc(
        &self,
        collection: &str,
        doc_id: &str,
        fields: DocumentFields,
    ) -> RemoteResult<()>;
    /// Merges `fields` into an existing document.
    async fn update_doc(
        &self,
        collection: &str,
        doc_id: &str,
        fields: DocumentFields,
    ) -> RemoteResult<()>;
    async fn delete_doc(&self, collection: &str, doc_id: &str) -> RemoteResult<()>;
}
