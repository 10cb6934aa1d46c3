#![allow(dead_code)]

use async_trait::async_trait;
use beproductive_core::model::record::{local_file_name, ItemRecord};
use beproductive_core::store::local::LocalResult;
use beproductive_core::store::remote::{DocumentFields, RemoteResult};
use beproductive_core::{
    AuthContext, CoreConfig, FeatureKind, FsLocalStore, Item, ItemCollectionManager, LiveQuery,
    LocalStore, LocalStoreError, QueryFilter, RemoteDocument, RemoteStore, RemoteStoreError,
    SqliteDocumentStore,
};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

pub const USER: &str = "user-1";

/// `FsLocalStore` with switchable failures.
pub struct FlakyLocalStore {
    inner: FsLocalStore,
    pub fail_list: AtomicBool,
    pub fail_writes: AtomicBool,
    failing_paths: Mutex<HashSet<String>>,
}

impl FlakyLocalStore {
    /// Makes every write and delete of `path` fail.
    pub fn fail_path(&self, path: impl Into<String>) {
        self.failing_paths.lock().insert(path.into());
    }

    pub fn heal(&self) {
        self.fail_list.store(false, Ordering::SeqCst);
        self.fail_writes.store(false, Ordering::SeqCst);
        self.failing_paths.lock().clear();
    }

    fn check(&self, op: &'static str, path: &str) -> LocalResult<()> {
        if self.failing_paths.lock().contains(path) {
            return Err(injected_io(op, path));
        }
        Ok(())
    }
}

fn injected_io(op: &'static str, path: &str) -> LocalStoreError {
    LocalStoreError::Io {
        op,
        path: path.to_string(),
        source: io::Error::new(io::ErrorKind::Other, "injected failure"),
    }
}

#[async_trait]
impl LocalStore for FlakyLocalStore {
    async fn list(&self, prefix: &str) -> LocalResult<Vec<String>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(injected_io("list", prefix));
        }
        self.inner.list(prefix).await
    }

    async fn read_text(&self, path: &str) -> LocalResult<String> {
        self.inner.read_text(path).await
    }

    async fn write_text(&self, path: &str, text: &str) -> LocalResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_io("write", path));
        }
        self.check("write", path)?;
        self.inner.write_text(path, text).await
    }

    async fn delete(&self, path: &str, idempotent: bool) -> LocalResult<()> {
        self.check("delete", path)?;
        self.inner.delete(path, idempotent).await
    }
}

/// `SqliteDocumentStore` with switchable failures.
pub struct FlakyRemoteStore {
    pub inner: SqliteDocumentStore,
    pub fail_query: AtomicBool,
    pub fail_add: AtomicBool,
    pub fail_set: AtomicBool,
    failing_docs: Mutex<HashSet<String>>,
}

impl FlakyRemoteStore {
    /// Makes every update and delete of `doc_id` fail.
    pub fn fail_doc(&self, doc_id: impl Into<String>) {
        self.failing_docs.lock().insert(doc_id.into());
    }

    fn check(&self, doc_id: &str) -> RemoteResult<()> {
        if self.failing_docs.lock().contains(doc_id) {
            return Err(injected_network());
        }
        Ok(())
    }
}

fn injected_network() -> RemoteStoreError {
    RemoteStoreError::Network("injected failure".to_string())
}

#[async_trait]
impl RemoteStore for FlakyRemoteStore {
    async fn query(&self, collection: &str, filters: &[QueryFilter]) -> RemoteResult<LiveQuery> {
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::PermissionDenied("injected".to_string()));
        }
        self.inner.query(collection, filters).await
    }

    async fn get_doc(&self, collection: &str, doc_id: &str) -> RemoteResult<Option<RemoteDocument>> {
        self.inner.get_doc(collection, doc_id).await
    }

    async fn add_doc(&self, collection: &str, fields: DocumentFields) -> RemoteResult<String> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(injected_network());
        }
        self.inner.add_doc(collection, fields).await
    }

    async fn set_doc(
        &self,
        collection: &str,
        doc_id: &str,
        fields: DocumentFields,
    ) -> RemoteResult<()> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(injected_network());
        }
        self.inner.set_doc(collection, doc_id, fields).await
    }

    async fn update_doc(
        &self,
        collection: &str,
        doc_id: &str,
        fields: DocumentFields,
    ) -> RemoteResult<()> {
        self.check(doc_id)?;
        self.inner.update_doc(collection, doc_id, fields).await
    }

    async fn delete_doc(&self, collection: &str, doc_id: &str) -> RemoteResult<()> {
        self.check(doc_id)?;
        self.inner.delete_doc(collection, doc_id).await
    }
}

/// Temp local directory plus in-memory remote store shared by managers.
pub struct Harness {
    _dir: TempDir,
    pub local: Arc<FlakyLocalStore>,
    pub remote: Arc<FlakyRemoteStore>,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let local = FsLocalStore::open(dir.path()).await.unwrap();
        Self {
            _dir: dir,
            local: Arc::new(FlakyLocalStore {
                inner: local,
                fail_list: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
                failing_paths: Mutex::new(HashSet::new()),
            }),
            remote: Arc::new(FlakyRemoteStore {
                inner: SqliteDocumentStore::open_in_memory().unwrap(),
                fail_query: AtomicBool::new(false),
                fail_add: AtomicBool::new(false),
                fail_set: AtomicBool::new(false),
                failing_docs: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn manager(&self, feature: FeatureKind, auth: AuthContext) -> ItemCollectionManager {
        self.manager_with(feature, auth, CoreConfig::default())
    }

    pub fn manager_with(
        &self,
        feature: FeatureKind,
        auth: AuthContext,
        config: CoreConfig,
    ) -> ItemCollectionManager {
        let local: Arc<dyn LocalStore> = self.local.clone();
        let remote: Arc<dyn RemoteStore> = self.remote.clone();
        ItemCollectionManager::new(feature, auth, config, local, Some(remote))
    }

    /// Writes a note record straight into the local directory.
    pub async fn seed_local_note(&self, id: &str, title: &str, pinned: bool, secs: i64) {
        let record = note_record(title, pinned, secs);
        self.local
            .write_text(
                &local_file_name(FeatureKind::Notes, id),
                &record.to_json().unwrap(),
            )
            .await
            .unwrap();
    }

    /// Writes a note document for `USER` straight into the remote store.
    pub async fn seed_remote_note(&self, id: &str, title: &str, pinned: bool, secs: i64) {
        let fields = note_record(title, pinned, secs)
            .to_document_fields(USER)
            .unwrap();
        self.remote
            .inner
            .set_doc(FeatureKind::Notes.collection(), id, fields)
            .await
            .unwrap();
    }
}

pub fn premium() -> AuthContext {
    AuthContext::new(USER, true)
}

pub fn free() -> AuthContext {
    AuthContext::new(USER, false)
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn note_record(title: &str, pinned: bool, secs: i64) -> ItemRecord {
    ItemRecord {
        title: title.to_string(),
        content: Some(format!("{title} body")),
        date: None,
        is_counter: None,
        timestamp: at(secs),
        pinned,
        category: None,
    }
}

pub fn ids(items: &[Item]) -> Vec<String> {
    items.iter().map(|item| item.id.clone()).collect()
}

pub fn titles(items: &[Item]) -> Vec<String> {
    items.iter().map(|item| item.title.clone()).collect()
}

/// Waits until the published view satisfies `predicate`.
pub async fn wait_for(
    rx: &mut watch::Receiver<Vec<Item>>,
    predicate: impl Fn(&[Item]) -> bool,
) -> Vec<Item> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let current = rx.borrow_and_update();
                if predicate(&current) {
                    return current.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap()
}
