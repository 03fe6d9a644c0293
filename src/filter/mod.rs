//! Catalog filtering: state, requests, selection persistence and summaries.
//!
//! The pieces compose as follows:
//!
//! - [`FilterController`] owns the canonical [`FilterState`], debounces search
//!   input and issues sequence-numbered listing requests. Only the newest
//!   resolution is ever rendered.
//! - [`CategorySelectionStore`] holds the selected categories and writes every
//!   change through to a [`KeyValueStore`](crate::storage::KeyValueStore).
//! - [`SummaryBinder`] projects search and selection onto badges, labels and
//!   the "List" buttons.
//! - [`CountReconciler`] fetches the advisory "N products" count for the
//!   current selection.

mod controller;
mod reconciler;
mod response;
mod selection;
mod state;
mod summary;

pub use controller::{
    Collaborators, ControllerOptions, FilterController, FilterEvent, FilterableView,
    UpdateCallback, DEFAULT_DEBOUNCE,
};
pub use reconciler::CountReconciler;
pub use response::{
    count_matching, count_rendered_items, item_offsets, match_offsets, FilterResponse,
    ITEM_SELECTORS,
};
pub use selection::{
    selection_key, CategorySelectionStore, SelectionEffect, SelectionError,
    SELECTION_KEY_PREFIX,
};
pub use state::{join_ids, CategoryId, FilterQuery, FilterState, ItemType, Phase, Sequencer, SortKey};
pub use summary::{
    collapsed_list_visible, count_label, expanded_list_visible, SummaryBinder, SummaryInput,
};
