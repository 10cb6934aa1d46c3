//! Item collection manager.
//!
//! # Responsibility
//! - Own the merged, ordered view of one feature's items across the local
//!   and remote stores.
//! - Run create/update/pin/move/delete use-cases against the owning store
//!   after tier validation.
//! - Keep the view current while the remote live query pushes snapshots.
//!
//! # Invariants
//! - Mutations are serialized through `mutations`; pin and capacity checks
//!   read the view while holding it, so no check-then-write race exists.
//! - The view changes only after a store write succeeded.
//! - An item is owned by one store at a time; moving is delete + recreate.
//! - Bulk operations are best-effort and report per-id outcomes.
//! - The view lock is never held across an await point.

use crate::auth::AuthContext;
use crate::config::{CoreConfig, FeatureKind};
use crate::error::{BulkOperation, CoreError, CoreResult, PartialFailure, PremiumFeature};
use crate::model::category::{category_file_name, normalize_category_name, Category};
use crate::model::item::{
    validate_payload, validate_title, Item, ItemDraft, ItemId, ItemPatch, Location,
};
use crate::model::record::{
    local_file_name, local_id_from_file_name, local_id_from_millis, local_list_prefix,
    ItemRecord, PINNED_FIELD, USER_ID_FIELD,
};
use crate::policy::tier::{self, ItemCounts, Limits, TierDecision};
use crate::service::selection::SelectionTarget;
use crate::service::view::ViewState;
use crate::store::local::LocalStore;
use crate::store::remote::{
    DocumentFields, LiveQuery, QueryFilter, RemoteSnapshot, RemoteStore, RemoteStoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// Non-fatal problem found while loading a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub location: Location,
    pub message: String,
}

/// Result of `load_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub items: Vec<Item>,
    pub warnings: Vec<LoadWarning>,
}

/// Per-id failure inside a bulk operation.
#[derive(Debug)]
pub struct ItemFailure {
    pub id: ItemId,
    pub error: CoreError,
}

/// Per-id outcome of a best-effort bulk operation.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub succeeded: Vec<ItemId>,
    pub failed: Vec<ItemFailure>,
}

/// Outcome of `delete_many`.
pub type DeleteReport = BulkReport;

impl BulkReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> BTreeSet<ItemId> {
        self.failed.iter().map(|failure| failure.id.clone()).collect()
    }

    /// Summarizes failures for the user; `None` when everything succeeded.
    pub fn partial_failure(&self, operation: BulkOperation) -> Option<PartialFailure> {
        if self.failed.is_empty() {
            return None;
        }
        let detail = self
            .failed
            .iter()
            .map(|failure| format!("{}: {}", failure.id, failure.error))
            .collect::<Vec<_>>()
            .join("; ");
        Some(PartialFailure {
            operation,
            failed: self.failed.len(),
            total: self.total(),
            failed_ids: self.failed.iter().map(|failure| failure.id.clone()).collect(),
            detail,
        })
    }
}

/// Outcome of `delete_category`. The category record is gone.
#[derive(Debug)]
pub struct CategoryDeleteReport {
    pub category: String,
    pub items: DeleteReport,
}

/// State guarded by the mutation queue.
#[derive(Debug, Default)]
struct MutationState {
    last_local_millis: i64,
}

/// View state shared with the remote listener task.
struct Shared {
    feature: FeatureKind,
    view: RwLock<ViewState>,
    published: watch::Sender<Vec<Item>>,
}

impl Shared {
    fn publish(&self) {
        let ordered = self.view.read().ordered();
        self.published.send_replace(ordered);
    }

    /// Applies one remote snapshot. Documents that fail to decode keep
    /// their previous view entry.
    fn apply_remote_snapshot(&self, snapshot: RemoteSnapshot) -> Vec<LoadWarning> {
        let mut warnings = Vec::new();
        let mut items = Vec::with_capacity(snapshot.len());
        let mut view = self.view.write();
        for document in snapshot {
            let decoded = ItemRecord::from_document_fields(&document.fields).and_then(|record| {
                record.into_item(document.id.clone(), Location::Remote, self.feature)
            });
            match decoded {
                Ok(item) => items.push(item),
                Err(err) => {
                    warnings.push(LoadWarning {
                        location: Location::Remote,
                        message: format!("document `{}`: {err}", document.id),
                    });
                    if let Some(existing) = view.get(&document.id) {
                        items.push(existing.clone());
                    }
                }
            }
        }
        let stats = view.apply_snapshot(Location::Remote, items);
        drop(view);
        debug!(
            "event=remote_snapshot module=collection status=ok feature={} upserted={} removed={} skipped={}",
            self.feature.plural(),
            stats.upserted,
            stats.removed,
            stats.skipped
        );
        warnings
    }
}

/// Single source of truth for one feature's merged item list.
///
/// Constructed per authenticated session and discarded on sign-out.
pub struct ItemCollectionManager {
    feature: FeatureKind,
    auth: AuthContext,
    config: CoreConfig,
    limits: Limits,
    local: Arc<dyn LocalStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    shared: Arc<Shared>,
    mutations: AsyncMutex<MutationState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ItemCollectionManager {
    pub fn new(
        feature: FeatureKind,
        auth: AuthContext,
        config: CoreConfig,
        local: Arc<dyn LocalStore>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Self {
        let (published, _) = watch::channel(Vec::new());
        let limits = Limits::from(&config);
        Self {
            feature,
            auth,
            config,
            limits,
            local,
            remote,
            shared: Arc::new(Shared {
                feature,
                view: RwLock::new(ViewState::default()),
                published,
            }),
            mutations: AsyncMutex::new(MutationState::default()),
            listener: Mutex::new(None),
        }
    }

    pub fn feature(&self) -> FeatureKind {
        self.feature
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Current merged view in presentation order.
    pub fn items(&self) -> Vec<Item> {
        self.shared.view.read().ordered()
    }

    pub fn get(&self, id: &str) -> Option<Item> {
        self.shared.view.read().get(id).cloned()
    }

    pub fn counts(&self) -> ItemCounts {
        self.shared.view.read().counts()
    }

    /// Receives the ordered view after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Item>> {
        self.shared.published.subscribe()
    }

    /// Permissions for the current tier and view.
    pub fn tier_status(&self) -> TierDecision {
        tier::evaluate(self.auth.is_premium(), self.counts(), &self.limits)
    }

    /// Whether a remote live query is currently attached.
    pub fn is_subscribed(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Loads both stores and starts following remote pushes.
    ///
    /// Never fails as a whole: store errors become warnings and the view keeps
    /// whatever could be loaded.
    pub async fn load_all(&self) -> LoadOutcome {
        let mut gate = self.mutations.lock().await;
        let mut warnings = Vec::new();

        self.load_local(&mut warnings).await;

        if let Some((remote, user_id)) = self.remote_session() {
            let filters = [QueryFilter::eq(USER_ID_FIELD, user_id)];
            match remote.query(self.feature.collection(), &filters).await {
                Ok(mut live) => {
                    match live.next().await {
                        Some(Ok(snapshot)) => {
                            warnings.extend(self.shared.apply_remote_snapshot(snapshot));
                        }
                        Some(Err(err)) => warnings.push(remote_warning(&err)),
                        None => warnings.push(LoadWarning {
                            location: Location::Remote,
                            message: "live query closed before the first snapshot".to_string(),
                        }),
                    }
                    self.follow(live);
                }
                Err(err) => warnings.push(remote_warning(&err)),
            }
        }

        if !self.auth.is_premium()
            && self.config.release_pins_on_downgrade
            && self.counts().pinned > 0
        {
            let report = self.release_pins_locked(&mut gate).await;
            for failure in report.failed {
                warnings.push(LoadWarning {
                    location: self
                        .get(&failure.id)
                        .map_or(Location::Local, |item| item.location),
                    message: format!("could not unpin `{}`: {}", failure.id, failure.error),
                });
            }
        }

        self.shared.publish();
        for warning in &warnings {
            warn!(
                "event=collection_load module=collection status=warning feature={} location={} message={}",
                self.feature.plural(),
                warning.location,
                warning.message
            );
        }
        let items = self.items();
        info!(
            "event=collection_load module=collection status=ok feature={} items={} warnings={}",
            self.feature.plural(),
            items.len(),
            warnings.len()
        );
        LoadOutcome { items, warnings }
    }

    /// Stops following remote pushes. The view keeps its last state.
    pub fn unsubscribe(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
            info!(
                "event=remote_unsubscribe module=collection status=ok feature={}",
                self.feature.plural()
            );
        }
    }

    /// Creates one item in the chosen store.
    pub async fn create(&self, draft: ItemDraft, location: Location) -> CoreResult<Item> {
        let mut gate = self.mutations.lock().await;
        let result = self.create_locked(&mut gate, draft, location).await;
        self.log_outcome("item_create", location, &result);
        result
    }

    /// Edits title, body or category, writing only to the owning store.
    pub async fn update(&self, id: &str, patch: ItemPatch) -> CoreResult<Item> {
        let _gate = self.mutations.lock().await;
        let current = self.find(id)?;
        if patch.is_empty() {
            return Ok(current);
        }

        let mut updated = current.clone();
        if let Some(title) = patch.title {
            validate_title(
                &title,
                self.config.title_min_chars,
                self.config.title_max_chars,
            )?;
            updated.title = title;
        }
        if let Some(payload) = patch.payload {
            validate_payload(&payload, self.feature)?;
            updated.payload = payload;
        }
        if let Some(category) = patch.category {
            updated.category = category
                .as_deref()
                .map(normalize_category_name)
                .transpose()?;
        }
        updated.timestamp = Utc::now();

        self.begin(id);
        let result = self.write_item(&updated).await;
        self.settle(id, |view| {
            if result.is_ok() {
                view.upsert(updated.clone());
            }
        });
        self.log_outcome("item_update", current.location, &result);
        result.map(|()| updated)
    }

    /// Flips the pinned flag of one item.
    pub async fn toggle_pin(&self, id: &str) -> CoreResult<Item> {
        let _gate = self.mutations.lock().await;
        let current = self.find(id)?;
        let result = self.set_pinned_locked(&current, !current.pinned).await;
        self.log_outcome("item_toggle_pin", current.location, &result);
        result
    }

    /// Applies staged pin states. Unpins run before pins so a swap stays
    /// within the limit; each change is checked against the live count.
    pub async fn apply_pins(&self, changes: Vec<(ItemId, bool)>) -> CoreResult<BulkReport> {
        tier::check_unpin(self.auth.is_premium())?;
        let _gate = self.mutations.lock().await;

        let mut ordered = changes;
        ordered.sort_by_key(|(_, pinned)| *pinned);

        let mut report = BulkReport::default();
        for (id, pinned) in ordered {
            let outcome = match self.find(&id) {
                Ok(current) if current.pinned == pinned => Ok(current),
                Ok(current) => self.set_pinned_locked(&current, pinned).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(_) => report.succeeded.push(id),
                Err(error) => report.failed.push(ItemFailure { id, error }),
            }
        }
        info!(
            "event=items_apply_pins module=collection status={} feature={} succeeded={} failed={}",
            status_label(report.is_complete()),
            self.feature.plural(),
            report.succeeded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Unpins every pinned item regardless of tier.
    pub async fn release_pins(&self) -> BulkReport {
        let mut gate = self.mutations.lock().await;
        self.release_pins_locked(&mut gate).await
    }

    /// Moves an item to the other store.
    ///
    /// The item is deleted from its store and recreated in the target. When
    /// the recreate fails it is written back to its original store and
    /// `PartialFailure` is returned.
    pub async fn move_location(&self, id: &str, target: Location) -> CoreResult<Item> {
        let mut gate = self.mutations.lock().await;
        let current = self.find(id)?;
        if current.location == target {
            return Ok(current);
        }
        if target == Location::Remote {
            tier::check_remote(self.auth.is_premium())?;
        }

        self.begin(id);
        if let Err(err) = self.delete_from_store(&current).await {
            self.settle(id, |_| {});
            self.log_step_error("item_move", "delete_origin", &err);
            return Err(err);
        }

        let mut moved = current.clone();
        moved.location = target;
        let recreated = match target {
            Location::Local => {
                moved.id = self.next_local_id(&mut gate, Utc::now());
                self.write_item(&moved).await
            }
            Location::Remote => match self.add_remote(&moved).await {
                Ok(new_id) => {
                    moved.id = new_id;
                    Ok(())
                }
                Err(err) => Err(err),
            },
        };

        match recreated {
            Ok(()) => {
                self.settle(id, |view| {
                    view.remove(id);
                    view.upsert(moved.clone());
                });
                info!(
                    "event=item_move module=collection status=ok feature={} from={} to={}",
                    self.feature.plural(),
                    current.location,
                    target
                );
                Ok(moved)
            }
            Err(create_err) => {
                self.log_step_error("item_move", "recreate_target", &create_err);
                let restored = self.restore(&current).await;
                let detail = match &restored {
                    Ok(()) => format!(
                        "recreate in {target} failed ({create_err}); item restored in {}",
                        current.location
                    ),
                    Err(restore_err) => format!(
                        "recreate in {target} failed ({create_err}); restore in {} failed ({restore_err})",
                        current.location
                    ),
                };
                self.settle(id, |view| {
                    if restored.is_ok() {
                        view.upsert(current.clone());
                    } else {
                        view.remove(id);
                    }
                });
                if let Err(restore_err) = &restored {
                    error!(
                        "event=item_move module=collection status=error step=restore_origin feature={} error_code={} error={}",
                        self.feature.plural(),
                        restore_err.code(),
                        restore_err
                    );
                }
                Err(CoreError::PartialFailure(PartialFailure {
                    operation: BulkOperation::Move,
                    failed: 1,
                    total: 1,
                    failed_ids: vec![id.to_string()],
                    detail,
                }))
            }
        }
    }

    /// Deletes every listed item from its owning store, concurrently per
    /// store. Unknown ids are reported as `NotFound`.
    pub async fn delete_many(&self, ids: impl IntoIterator<Item = ItemId>) -> DeleteReport {
        let _gate = self.mutations.lock().await;
        let ids: Vec<ItemId> = ids.into_iter().collect();
        self.delete_many_locked(ids).await
    }

    /// Creates a category record. A name with the same `category_key` as an
    /// existing record returns that record.
    pub async fn create_category(&self, name: &str) -> CoreResult<Category> {
        let name = normalize_category_name(name)?;
        let _gate = self.mutations.lock().await;
        let file = category_file_name(self.feature, &name);
        if let Ok(raw) = self.local.read_text(&file).await {
            if let Ok(existing) = serde_json::from_str::<Category>(&raw) {
                return Ok(existing);
            }
        }
        let category = Category {
            name,
            timestamp: Utc::now(),
        };
        let raw = serde_json::to_string(&category)
            .map_err(|err| CoreError::Record(err.into()))?;
        self.local.write_text(&file, &raw).await?;
        Ok(category)
    }

    /// Lists category records sorted by name. Unreadable records are skipped.
    pub async fn categories(&self) -> CoreResult<Vec<Category>> {
        let names = self
            .local
            .list(self.feature.category_file_prefix())
            .await?;
        let mut categories = Vec::with_capacity(names.len());
        for file in names {
            let parsed = match self.local.read_text(&file).await {
                Ok(raw) => serde_json::from_str::<Category>(&raw).map_err(|err| err.to_string()),
                Err(err) => Err(err.to_string()),
            };
            match parsed {
                Ok(category) => categories.push(category),
                Err(message) => warn!(
                    "event=category_list module=collection status=warning feature={} message={}",
                    self.feature.plural(),
                    message
                ),
            }
        }
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    /// Deletes all member items, then the category record.
    ///
    /// Member failures are reported but do not keep the record alive. A
    /// failure to remove the record itself is a `PartialFailure`.
    pub async fn delete_category(&self, name: &str) -> CoreResult<CategoryDeleteReport> {
        let name = normalize_category_name(name)?;
        let _gate = self.mutations.lock().await;

        let members = self.shared.view.read().ids_in_category(&name);
        let items = self.delete_many_locked(members).await;

        let file = category_file_name(self.feature, &name);
        if let Err(err) = self.local.delete(&file, true).await {
            error!(
                "event=category_delete module=collection status=error feature={} error={}",
                self.feature.plural(),
                err
            );
            return Err(CoreError::PartialFailure(PartialFailure {
                operation: BulkOperation::CategoryDelete,
                failed: items.failed.len() + 1,
                total: items.total() + 1,
                failed_ids: items.failed_ids().into_iter().collect(),
                detail: format!("category record `{name}` was not removed: {err}"),
            }));
        }

        info!(
            "event=category_delete module=collection status={} feature={} deleted={} failed={}",
            status_label(items.is_complete()),
            self.feature.plural(),
            items.succeeded.len(),
            items.failed.len()
        );
        Ok(CategoryDeleteReport {
            category: name,
            items,
        })
    }

    async fn create_locked(
        &self,
        gate: &mut MutationState,
        draft: ItemDraft,
        location: Location,
    ) -> CoreResult<Item> {
        validate_title(
            &draft.title,
            self.config.title_min_chars,
            self.config.title_max_chars,
        )?;
        validate_payload(&draft.payload, self.feature)?;
        let category = draft
            .category
            .as_deref()
            .map(normalize_category_name)
            .transpose()?;
        tier::check_create(self.auth.is_premium(), self.counts(), location, &self.limits)?;

        let now = Utc::now();
        let mut item = Item {
            id: ItemId::new(),
            title: draft.title,
            payload: draft.payload,
            timestamp: now,
            pinned: false,
            location,
            category,
        };

        match location {
            Location::Local => {
                item.id = self.next_local_id(gate, now);
                self.begin(&item.id);
                let result = self.write_item(&item).await;
                self.settle(&item.id, |view| {
                    if result.is_ok() {
                        view.upsert(item.clone());
                    }
                });
                result?;
            }
            Location::Remote => {
                item.id = self.add_remote(&item).await?;
                self.settle(&item.id, |view| view.upsert(item.clone()));
            }
        }
        Ok(item)
    }

    async fn set_pinned_locked(&self, current: &Item, pinned: bool) -> CoreResult<Item> {
        if pinned {
            let pinned_total = self.counts().pinned;
            tier::check_pin(
                self.auth.is_premium(),
                pinned_total,
                current.pinned,
                &self.limits,
            )?;
        } else {
            tier::check_unpin(self.auth.is_premium())?;
        }
        self.write_pinned(current, pinned).await
    }

    async fn write_pinned(&self, current: &Item, pinned: bool) -> CoreResult<Item> {
        let mut updated = current.clone();
        updated.pinned = pinned;

        self.begin(&current.id);
        let result = match current.location {
            Location::Local => self.write_item(&updated).await,
            Location::Remote => {
                let mut fields = DocumentFields::new();
                fields.insert(PINNED_FIELD.to_string(), Value::Bool(pinned));
                self.update_remote(&current.id, fields).await
            }
        };
        self.settle(&current.id, |view| {
            if result.is_ok() {
                view.upsert(updated.clone());
            }
        });
        result.map(|()| updated)
    }

    async fn release_pins_locked(&self, _gate: &mut MutationState) -> BulkReport {
        let pinned: Vec<Item> = {
            let view = self.shared.view.read();
            view.pinned_ids()
                .iter()
                .filter_map(|id| view.get(id).cloned())
                .collect()
        };
        let mut report = BulkReport::default();
        for item in pinned {
            match self.write_pinned(&item, false).await {
                Ok(_) => report.succeeded.push(item.id),
                Err(error) => report.failed.push(ItemFailure { id: item.id, error }),
            }
        }
        info!(
            "event=items_release_pins module=collection status={} feature={} released={} failed={}",
            status_label(report.is_complete()),
            self.feature.plural(),
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    async fn delete_many_locked(&self, ids: Vec<ItemId>) -> DeleteReport {
        let mut report = DeleteReport::default();
        let unique: BTreeSet<ItemId> = ids.into_iter().collect();

        let mut local_targets = Vec::new();
        let mut remote_targets = Vec::new();
        {
            let mut view = self.shared.view.write();
            for id in unique {
                match view.get(&id).cloned() {
                    Some(item) => {
                        view.mark_in_flight(&id);
                        match item.location {
                            Location::Local => local_targets.push(item),
                            Location::Remote => remote_targets.push(item),
                        }
                    }
                    None => report.failed.push(ItemFailure {
                        error: CoreError::NotFound(id.clone()),
                        id,
                    }),
                }
            }
        }

        let (local_results, remote_results) = tokio::join!(
            join_all(local_targets.iter().map(|item| self.delete_from_store(item))),
            join_all(remote_targets.iter().map(|item| self.delete_from_store(item))),
        );

        {
            let mut view = self.shared.view.write();
            let settled = local_targets
                .into_iter()
                .zip(local_results)
                .chain(remote_targets.into_iter().zip(remote_results));
            for (item, result) in settled {
                view.clear_in_flight(&item.id);
                match result {
                    Ok(()) => {
                        view.remove(&item.id);
                        report.succeeded.push(item.id);
                    }
                    Err(error) => report.failed.push(ItemFailure { id: item.id, error }),
                }
            }
        }
        self.shared.publish();

        info!(
            "event=items_delete module=collection status={} feature={} deleted={} failed={}",
            status_label(report.is_complete()),
            self.feature.plural(),
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    async fn load_local(&self, warnings: &mut Vec<LoadWarning>) {
        let prefix = local_list_prefix(self.feature);
        let files = match self.local.list(&prefix).await {
            Ok(files) => files,
            Err(err) => {
                warnings.push(LoadWarning {
                    location: Location::Local,
                    message: err.to_string(),
                });
                return;
            }
        };

        let reads = join_all(files.iter().filter_map(|file| {
            let id = local_id_from_file_name(self.feature, file)?;
            Some(async move { (id, self.local.read_text(file).await) })
        }))
        .await;

        let mut items = Vec::with_capacity(reads.len());
        let mut unreadable = Vec::new();
        for (id, read) in reads {
            let decoded = read.map_err(CoreError::from).and_then(|raw| {
                ItemRecord::from_json(&raw)
                    .and_then(|record| record.into_item(id.clone(), Location::Local, self.feature))
                    .map_err(CoreError::from)
            });
            match decoded {
                Ok(item) => items.push(item),
                Err(err) => {
                    warnings.push(LoadWarning {
                        location: Location::Local,
                        message: format!("record `{id}`: {err}"),
                    });
                    unreadable.push(id);
                }
            }
        }

        let mut view = self.shared.view.write();
        items.extend(unreadable.iter().filter_map(|id| view.get(id).cloned()));
        view.apply_snapshot(Location::Local, items);
    }

    fn follow(&self, mut live: LiveQuery) {
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            while let Some(next) = live.next().await {
                match next {
                    Ok(snapshot) => {
                        for warning in shared.apply_remote_snapshot(snapshot) {
                            warn!(
                                "event=remote_snapshot module=collection status=warning feature={} message={}",
                                shared.feature.plural(),
                                warning.message
                            );
                        }
                        shared.publish();
                    }
                    Err(err) => warn!(
                        "event=remote_snapshot module=collection status=error feature={} error={}",
                        shared.feature.plural(),
                        err
                    ),
                }
            }
        });
        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }
    }

    fn find(&self, id: &str) -> CoreResult<Item> {
        self.get(id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    fn begin(&self, id: &str) {
        self.shared.view.write().mark_in_flight(id);
    }

    /// Ends an in-flight mutation and applies its result in one step.
    fn settle(&self, id: &str, apply: impl FnOnce(&mut ViewState)) {
        {
            let mut view = self.shared.view.write();
            view.clear_in_flight(id);
            apply(&mut view);
        }
        self.shared.publish();
    }

    fn next_local_id(&self, state: &mut MutationState, now: DateTime<Utc>) -> ItemId {
        let mut millis = now.timestamp_millis().max(state.last_local_millis + 1);
        let view = self.shared.view.read();
        while view.contains(&local_id_from_millis(millis)) {
            millis += 1;
        }
        state.last_local_millis = millis;
        local_id_from_millis(millis)
    }

    fn remote_session(&self) -> Option<(&Arc<dyn RemoteStore>, &str)> {
        Some((self.remote.as_ref()?, self.auth.user_id()?))
    }

    fn require_remote(&self) -> CoreResult<(&Arc<dyn RemoteStore>, &str)> {
        match (self.remote.as_ref(), self.auth.user_id()) {
            (Some(remote), Some(user_id)) => Ok((remote, user_id)),
            (_, None) => Err(CoreError::Tier(PremiumFeature::RemoteStorage)),
            (None, Some(_)) => Err(CoreError::Remote(RemoteStoreError::PermissionDenied(
                "no remote store configured for this session".to_string(),
            ))),
        }
    }

    /// Writes the full record of `item` to its owning store.
    async fn write_item(&self, item: &Item) -> CoreResult<()> {
        match item.location {
            Location::Local => {
                let raw = ItemRecord::from_item(item).to_json()?;
                self.local
                    .write_text(&local_file_name(self.feature, &item.id), &raw)
                    .await?;
                Ok(())
            }
            Location::Remote => {
                let (_, user_id) = self.require_remote()?;
                let fields = ItemRecord::from_item(item).to_update_fields(user_id)?;
                self.update_remote(&item.id, fields).await
            }
        }
    }

    async fn add_remote(&self, item: &Item) -> CoreResult<ItemId> {
        let (remote, user_id) = self.require_remote()?;
        let fields = ItemRecord::from_item(item).to_document_fields(user_id)?;
        Ok(remote.add_doc(self.feature.collection(), fields).await?)
    }

    async fn update_remote(&self, id: &str, fields: DocumentFields) -> CoreResult<()> {
        let (remote, _) = self.require_remote()?;
        Ok(remote
            .update_doc(self.feature.collection(), id, fields)
            .await?)
    }

    async fn delete_from_store(&self, item: &Item) -> CoreResult<()> {
        match item.location {
            Location::Local => Ok(self
                .local
                .delete(&local_file_name(self.feature, &item.id), true)
                .await?),
            Location::Remote => {
                let (remote, _) = self.require_remote()?;
                Ok(remote
                    .delete_doc(self.feature.collection(), &item.id)
                    .await?)
            }
        }
    }

    /// Recreates `item` under its original id in its original store.
    async fn restore(&self, item: &Item) -> CoreResult<()> {
        match item.location {
            Location::Local => self.write_item(item).await,
            Location::Remote => {
                let (remote, user_id) = self.require_remote()?;
                let fields = ItemRecord::from_item(item).to_document_fields(user_id)?;
                Ok(remote
                    .set_doc(self.feature.collection(), &item.id, fields)
                    .await?)
            }
        }
    }

    fn log_outcome<T>(&self, event: &str, location: Location, result: &CoreResult<T>) {
        match result {
            Ok(_) => info!(
                "event={} module=collection status=ok feature={} location={}",
                event,
                self.feature.plural(),
                location
            ),
            Err(err) => warn!(
                "event={} module=collection status=error feature={} location={} error_code={}",
                event,
                self.feature.plural(),
                location,
                err.code()
            ),
        }
    }

    fn log_step_error(&self, event: &str, step: &str, err: &CoreError) {
        warn!(
            "event={} module=collection status=error step={} feature={} error_code={} error={}",
            event,
            step,
            self.feature.plural(),
            err.code(),
            err
        );
    }
}

impl Drop for ItemCollectionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl SelectionTarget for ItemCollectionManager {
    async fn delete_many(&self, ids: Vec<ItemId>) -> DeleteReport {
        ItemCollectionManager::delete_many(self, ids).await
    }

    async fn apply_pins(&self, changes: Vec<(ItemId, bool)>) -> CoreResult<BulkReport> {
        ItemCollectionManager::apply_pins(self, changes).await
    }
}

fn remote_warning(err: &RemoteStoreError) -> LoadWarning {
    LoadWarning {
        location: Location::Remote,
        message: err.to_string(),
    }
}

fn status_label(complete: bool) -> &'static str {
    if complete {
        "ok"
    } else {
        "partial"
    }
}
