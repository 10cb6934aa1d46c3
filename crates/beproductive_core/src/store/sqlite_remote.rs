//! Embedded `RemoteStore` implementation on SQLite.
//!
//! # Responsibility
//! - Persist JSON documents per collection in the `documents` table.
//! - Push a fresh snapshot to every live query of a collection after each
//!   successful write.
//!
//! # Invariants
//! - Lock order is `subscriptions` then `conn`; `conn` is never held while
//!   acquiring `subscriptions`.
//! - Closed live queries are pruned on the next notification.
//! - `delete_doc` on a missing document succeeds.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::store::remote::{
    matches_all, DocumentFields, LiveQuery, LiveQuerySender, QueryFilter, RemoteDocument,
    RemoteResult, RemoteStore, RemoteStoreError,
};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

struct Subscription {
    collection: String,
    filters: Vec<QueryFilter>,
    sender: LiveQuerySender,
}

/// SQLite-backed document store with in-process live queries.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SqliteDocumentStore {
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a connection that already has migrations applied.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Number of live queries that have not been unsubscribed yet.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|subscription| !subscription.sender.is_closed())
            .count()
    }

    fn load_collection(
        &self,
        collection: &str,
        filters: &[QueryFilter],
    ) -> RemoteResult<Vec<RemoteDocument>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT doc_id, body
                 FROM documents
                 WHERE collection = ?1
                 ORDER BY doc_id ASC;",
            )
            .map_err(backend)?;
        let mut rows = stmt.query([collection]).map_err(backend)?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next().map_err(backend)? {
            let doc_id: String = row.get(0).map_err(backend)?;
            let body: String = row.get(1).map_err(backend)?;
            let fields = parse_body(&doc_id, &body)?;
            if matches_all(filters, &fields) {
                documents.push(RemoteDocument {
                    id: doc_id,
                    fields,
                });
            }
        }
        Ok(documents)
    }

    fn write_body(&self, collection: &str, doc_id: &str, fields: &DocumentFields) -> RemoteResult<()> {
        let body = serde_json::to_string(fields).map_err(backend)?;
        let now = Utc::now().timestamp_millis();
        self.conn
            .lock()
            .execute(
                "INSERT INTO documents (collection, doc_id, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT (collection, doc_id)
                 DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at;",
                params![collection, doc_id, body, now],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn read_fields(&self, collection: &str, doc_id: &str) -> RemoteResult<Option<DocumentFields>> {
        let body: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND doc_id = ?2;",
                params![collection, doc_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        body.map(|body| parse_body(doc_id, &body)).transpose()
    }

    fn notify(&self, collection: &str) {
        let mut subscriptions = self.subscriptions.lock();
        subscriptions.retain(|subscription| !subscription.sender.is_closed());
        for subscription in subscriptions
            .iter()
            .filter(|subscription| subscription.collection == collection)
        {
            let snapshot = self.load_collection(collection, &subscription.filters);
            if let Err(err) = &snapshot {
                warn!(
                    "event=remote_notify module=store status=error collection={} error={}",
                    collection, err
                );
            }
            subscription.sender.send(snapshot);
        }
    }
}

#[async_trait]
impl RemoteStore for SqliteDocumentStore {
    async fn query(&self, collection: &str, filters: &[QueryFilter]) -> RemoteResult<LiveQuery> {
        let mut subscriptions = self.subscriptions.lock();
        let initial = self.load_collection(collection, filters)?;
        let (sender, live) = LiveQuery::channel();
        sender.send(Ok(initial));
        subscriptions.push(Subscription {
            collection: collection.to_string(),
            filters: filters.to_vec(),
            sender,
        });
        debug!(
            "event=remote_subscribe module=store status=ok collection={} subscribers={}",
            collection,
            subscriptions.len()
        );
        Ok(live)
    }

    async fn get_doc(&self, collection: &str, doc_id: &str) -> RemoteResult<Option<RemoteDocument>> {
        Ok(self
            .read_fields(collection, doc_id)?
            .map(|fields| RemoteDocument {
                id: doc_id.to_string(),
                fields,
            }))
    }

    async fn add_doc(&self, collection: &str, fields: DocumentFields) -> RemoteResult<String> {
        let doc_id = Uuid::new_v4().simple().to_string();
        self.write_body(collection, &doc_id, &fields)?;
        self.notify(collection);
        Ok(doc_id)
    }

    async fn set_doc(
        &self,
        collection: &str,
        doc_id: &str,
        fields: DocumentFields,
    ) -> RemoteResult<()> {
        self.write_body(collection, doc_id, &fields)?;
        self.notify(collection);
        Ok(())
    }

    async fn update_doc(
        &self,
        collection: &str,
        doc_id: &str,
        fields: DocumentFields,
    ) -> RemoteResult<()> {
        let mut merged =
            self.read_fields(collection, doc_id)?
                .ok_or_else(|| RemoteStoreError::NotFound {
                    collection: collection.to_string(),
                    doc_id: doc_id.to_string(),
                })?;
        merged.extend(fields);
        self.write_body(collection, doc_id, &merged)?;
        self.notify(collection);
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, doc_id: &str) -> RemoteResult<()> {
        let changed = self
            .conn
            .lock()
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2;",
                params![collection, doc_id],
            )
            .map_err(backend)?;
        if changed > 0 {
            self.notify(collection);
        }
        Ok(())
    }
}

fn parse_body(doc_id: &str, body: &str) -> RemoteResult<DocumentFields> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(RemoteStoreError::InvalidDocument(format!(
            "document `{doc_id}` is not a JSON object"
        ))),
        Err(err) => Err(RemoteStoreError::InvalidDocument(format!(
            "document `{doc_id}`: {err}"
        ))),
    }
}

fn backend(err: impl std::fmt::Display) -> RemoteStoreError {
    RemoteStoreError::Backend(err.to_string())
}
