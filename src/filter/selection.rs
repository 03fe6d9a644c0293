//! Persisted multi-select state for category filters.

use std::sync::Arc;
use thiserror::Error;

use super::state::{CategoryId, ItemType};
use crate::page::{Page, Target};
use crate::storage::KeyValueStore;

/// Key prefix for persisted selections; the item type is appended.
pub const SELECTION_KEY_PREFIX: &str = "selectedCategories.";

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Failed to read saved category selection: {0}")]
    Load(anyhow::Error),
    #[error("Failed to save category selection: {0}")]
    Persist(anyhow::Error),
}

/// What the owner should do after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEffect {
    /// The set did not change.
    Unchanged,
    /// The set changed and filtering on selection is enabled.
    Refresh,
    /// The set changed; only summaries need updating until filters are applied.
    SummaryOnly,
}

/// Owns the selected category ids and their persisted copy.
///
/// Every mutation writes the whole set through to storage immediately.
/// Iteration order of [`selected`](Self::selected) carries no meaning.
pub struct CategorySelectionStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    selected: Vec<CategoryId>,
    filter_on_select: bool,
}

impl CategorySelectionStore {
    /// Rehydrate the selection for `item_type`.
    ///
    /// Persisted ids that are not among `available` are dropped; if anything
    /// was dropped (or the stored value was unreadable) the corrected set is
    /// written back. Nothing is fetched here.
    pub async fn rehydrate(
        storage: Arc<dyn KeyValueStore>,
        item_type: ItemType,
        available: &[CategoryId],
        filter_on_select: bool,
    ) -> Result<Self, SelectionError> {
        let key = selection_key(item_type);
        let raw = storage.get(&key).await.map_err(SelectionError::Load)?;

        let (persisted, readable) = match raw.as_deref() {
            None => (Vec::new(), true),
            Some(json) => match serde_json::from_str::<Vec<CategoryId>>(json) {
                Ok(ids) => (ids, true),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding unreadable saved selection");
                    (Vec::new(), false)
                }
            },
        };

        let mut selected: Vec<CategoryId> = Vec::with_capacity(persisted.len());
        let mut dropped = 0usize;
        for id in persisted {
            if !available.contains(&id) {
                tracing::debug!(category = %id, "Dropping saved category no longer offered");
                dropped += 1;
            } else if !selected.contains(&id) {
                selected.push(id);
            } else {
                dropped += 1;
            }
        }

        let store = Self {
            storage,
            key,
            selected,
            filter_on_select,
        };

        if dropped > 0 || !readable {
            tracing::info!(
                key = %store.key,
                dropped,
                kept = store.selected.len(),
                "Saved category selection corrected"
            );
            store.persist().await?;
        }

        Ok(store)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub async fn select(&mut self, id: CategoryId) -> Result<SelectionEffect, SelectionError> {
        if self.selected.contains(&id) {
            return Ok(SelectionEffect::Unchanged);
        }
        self.selected.push(id);
        self.commit().await
    }

    pub async fn deselect(&mut self, id: &CategoryId) -> Result<SelectionEffect, SelectionError> {
        let before = self.selected.len();
        self.selected.retain(|s| s != id);
        if self.selected.len() == before {
            return Ok(SelectionEffect::Unchanged);
        }
        self.commit().await
    }

    pub async fn toggle(&mut self, id: CategoryId) -> Result<SelectionEffect, SelectionError> {
        if self.is_selected(&id) {
            self.deselect(&id).await
        } else {
            self.select(id).await
        }
    }

    pub async fn clear(&mut self) -> Result<SelectionEffect, SelectionError> {
        if self.selected.is_empty() {
            return Ok(SelectionEffect::Unchanged);
        }
        self.selected.clear();
        self.commit().await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn selected(&self) -> &[CategoryId] {
        &self.selected
    }

    pub fn is_selected(&self, id: &CategoryId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn filter_on_select(&self) -> bool {
        self.filter_on_select
    }

    // ========================================================================
    // Page Sync
    // ========================================================================

    /// Check exactly the selected options on `page`.
    pub fn apply_to_controls(&self, page: &mut dyn Page) {
        for id in page.category_options() {
            let checked = self.is_selected(&id);
            page.set_checked(&Target::CategoryOption(id), checked);
        }
    }

    /// Teardown hook for the owning controller.
    ///
    /// The store binds no listeners and owns no tasks, and every mutation is
    /// written through before it returns, so there is nothing to release or
    /// flush. It only records the final selection size.
    pub fn destroy(&mut self) {
        tracing::debug!(key = %self.key, selected = self.selected.len(), "Selection store released");
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    async fn commit(&self) -> Result<SelectionEffect, SelectionError> {
        self.persist().await?;
        Ok(if self.filter_on_select {
            SelectionEffect::Refresh
        } else {
            SelectionEffect::SummaryOnly
        })
    }

    async fn persist(&self) -> Result<(), SelectionError> {
        let json = serde_json::to_string(&self.selected)
            .map_err(|e| SelectionError::Persist(e.into()))?;
        self.storage
            .set(&self.key, &json)
            .await
            .map_err(SelectionError::Persist)
    }
}

/// Storage key for the selection of `item_type`.
pub fn selection_key(item_type: ItemType) -> String {
    format!("{}{}", SELECTION_KEY_PREFIX, item_type.as_str())
}
