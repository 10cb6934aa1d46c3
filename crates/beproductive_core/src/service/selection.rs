//! Multi-select state machine over a collection.
//!
//! # Responsibility
//! - Track the active selection mode and the selected ids.
//! - Stage pin toggles against a snapshot so they can be previewed,
//!   committed in one batch, or discarded.
//!
//! # Invariants
//! - Modes are entered only from `Normal` and always return to `Normal`
//!   through `cancel` or a completed `confirm`.
//! - `Edit` holds at most one selected id.
//! - Staged pins never exceed the pin limit.

use crate::error::{CoreError, CoreResult};
use crate::model::item::{Item, ItemId};
use crate::policy::tier::{self, Limits};
use crate::service::collection::{BulkReport, DeleteReport};
use crate::service::view::sort_items;
use async_trait::async_trait;
use log::info;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Operations a confirmed selection is applied to.
#[async_trait]
pub trait SelectionTarget: Send + Sync {
    async fn delete_many(&self, ids: Vec<ItemId>) -> DeleteReport;
    async fn apply_pins(&self, changes: Vec<(ItemId, bool)>) -> CoreResult<BulkReport>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionMode {
    #[default]
    Normal,
    Delete,
    Pin,
    Edit,
}

impl SelectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Delete => "delete",
            Self::Pin => "pin",
            Self::Edit => "edit",
        }
    }
}

/// Result of `enter_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Entered(SelectionMode),
    /// The collection is empty; the mode did not change.
    NothingAvailable,
}

/// Result of a completed `confirm`.
#[derive(Debug)]
pub enum ConfirmOutcome {
    Deleted(DeleteReport),
    Pinned(BulkReport),
    Edit(ItemId),
}

#[derive(Debug)]
pub enum SelectionError {
    /// No selection mode is active.
    NotSelecting,
    /// Another mode is active and must be confirmed or cancelled first.
    AlreadySelecting(SelectionMode),
    WrongMode {
        expected: SelectionMode,
        actual: SelectionMode,
    },
    EmptySelection,
    UnknownItem(ItemId),
    Core(CoreError),
}

impl Display for SelectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSelecting => write!(f, "no selection mode is active"),
            Self::AlreadySelecting(mode) => {
                write!(f, "selection mode `{}` is already active", mode.as_str())
            }
            Self::WrongMode { expected, actual } => write!(
                f,
                "operation requires `{}` mode, current mode is `{}`",
                expected.as_str(),
                actual.as_str()
            ),
            Self::EmptySelection => write!(f, "nothing is selected"),
            Self::UnknownItem(id) => write!(f, "item is not part of the selection: {id}"),
            Self::Core(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SelectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CoreError> for SelectionError {
    fn from(value: CoreError) -> Self {
        Self::Core(value)
    }
}

pub type SelectionResult<T> = Result<T, SelectionError>;

/// Selection state for one collection screen.
#[derive(Debug, Clone)]
pub struct SelectionController {
    is_premium: bool,
    limits: Limits,
    mode: SelectionMode,
    selected: BTreeSet<ItemId>,
    pin_snapshot: BTreeMap<ItemId, bool>,
    staged_pins: BTreeMap<ItemId, bool>,
}

impl SelectionController {
    pub fn new(is_premium: bool, limits: Limits) -> Self {
        Self {
            is_premium,
            limits,
            mode: SelectionMode::Normal,
            selected: BTreeSet::new(),
            pin_snapshot: BTreeMap::new(),
            staged_pins: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn selected_ids(&self) -> Vec<ItemId> {
        self.selected.iter().cloned().collect()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Staged pin state of one item while in `Pin` mode.
    pub fn staged_pin(&self, id: &str) -> Option<bool> {
        self.staged_pins.get(id).copied()
    }

    pub fn enter_mode(&mut self, mode: SelectionMode, items: &[Item]) -> SelectionResult<ModeChange> {
        if self.mode != SelectionMode::Normal {
            return Err(SelectionError::AlreadySelecting(self.mode));
        }
        if mode == SelectionMode::Normal {
            return Ok(ModeChange::Entered(SelectionMode::Normal));
        }
        if items.is_empty() {
            return Ok(ModeChange::NothingAvailable);
        }

        self.selected.clear();
        if mode == SelectionMode::Pin {
            self.pin_snapshot = items
                .iter()
                .map(|item| (item.id.clone(), item.pinned))
                .collect();
            self.staged_pins = self.pin_snapshot.clone();
        }
        self.mode = mode;
        Ok(ModeChange::Entered(mode))
    }

    /// Adds or removes `id`. In `Edit` mode a new id replaces the selection.
    pub fn toggle_select(&mut self, id: &str) -> SelectionResult<()> {
        match self.mode {
            SelectionMode::Delete => {
                if !self.selected.remove(id) {
                    self.selected.insert(id.to_string());
                }
                Ok(())
            }
            SelectionMode::Edit => {
                let was_selected = self.selected.contains(id);
                self.selected.clear();
                if !was_selected {
                    self.selected.insert(id.to_string());
                }
                Ok(())
            }
            SelectionMode::Normal => Err(SelectionError::NotSelecting),
            SelectionMode::Pin => Err(SelectionError::WrongMode {
                expected: SelectionMode::Delete,
                actual: SelectionMode::Pin,
            }),
        }
    }

    /// Flips the staged pin of `id` and returns the new staged state.
    pub fn toggle_pin_preview(&mut self, id: &str) -> SelectionResult<bool> {
        if self.mode != SelectionMode::Pin {
            return Err(SelectionError::WrongMode {
                expected: SelectionMode::Pin,
                actual: self.mode,
            });
        }
        let current = self
            .staged_pins
            .get(id)
            .copied()
            .ok_or_else(|| SelectionError::UnknownItem(id.to_string()))?;

        if current {
            tier::check_unpin(self.is_premium)?;
        } else {
            let pinned_total = self.staged_pins.values().filter(|pinned| **pinned).count();
            tier::check_pin(self.is_premium, pinned_total, current, &self.limits)?;
        }
        self.staged_pins.insert(id.to_string(), !current);
        Ok(!current)
    }

    /// `items` with staged pins applied, in presentation order.
    pub fn preview(&self, items: &[Item]) -> Vec<Item> {
        let mut preview: Vec<Item> = items
            .iter()
            .map(|item| match self.staged_pins.get(&item.id) {
                Some(pinned) => Item {
                    pinned: *pinned,
                    ..item.clone()
                },
                None => item.clone(),
            })
            .collect();
        sort_items(&mut preview);
        preview
    }

    /// Staged pin changes that differ from the snapshot.
    pub fn staged_changes(&self) -> Vec<(ItemId, bool)> {
        self.staged_pins
            .iter()
            .filter(|(id, pinned)| self.pin_snapshot.get(*id) != Some(*pinned))
            .map(|(id, pinned)| (id.clone(), *pinned))
            .collect()
    }

    /// Leaves the active mode and returns the pin states as they were when
    /// `Pin` mode was entered (empty for other modes).
    pub fn cancel(&mut self) -> BTreeMap<ItemId, bool> {
        let restored = std::mem::take(&mut self.pin_snapshot);
        info!(
            "event=selection_cancel module=selection status=ok mode={} selected={}",
            self.mode.as_str(),
            self.selected.len()
        );
        self.reset();
        restored
    }

    /// Applies the selection to `target` and returns to `Normal`.
    ///
    /// An empty `Delete` or `Edit` selection is rejected and the mode kept.
    pub async fn confirm(
        &mut self,
        target: &dyn SelectionTarget,
    ) -> SelectionResult<ConfirmOutcome> {
        let mode = self.mode;
        let outcome = match mode {
            SelectionMode::Normal => return Err(SelectionError::NotSelecting),
            SelectionMode::Delete => {
                if self.selected.is_empty() {
                    return Err(SelectionError::EmptySelection);
                }
                let report = target.delete_many(self.selected_ids()).await;
                Ok(ConfirmOutcome::Deleted(report))
            }
            SelectionMode::Edit => match self.selected.iter().next() {
                Some(id) => Ok(ConfirmOutcome::Edit(id.clone())),
                None => return Err(SelectionError::EmptySelection),
            },
            SelectionMode::Pin => {
                let changes = self.staged_changes();
                if changes.is_empty() {
                    Ok(ConfirmOutcome::Pinned(BulkReport::default()))
                } else {
                    target
                        .apply_pins(changes)
                        .await
                        .map(ConfirmOutcome::Pinned)
                        .map_err(SelectionError::from)
                }
            }
        };
        info!(
            "event=selection_confirm module=selection status={} mode={}",
            if outcome.is_ok() { "ok" } else { "error" },
            mode.as_str()
        );
        self.reset();
        outcome
    }

    fn reset(&mut self) {
        self.mode = SelectionMode::Normal;
        self.selected.clear();
        self.pin_snapshot.clear();
        self.staged_pins.clear();
    }
}
