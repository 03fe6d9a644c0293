//! Orchestration of filter state, requests and page updates.
//!
//! [`FilterController`] owns the canonical [`FilterState`], the
//! [`CategorySelectionStore`], the [`SummaryBinder`] and the
//! [`CountReconciler`]. Listing requests run on spawned tasks and report back
//! over an mpsc channel as [`FilterEvent`]s; the owning loop feeds those into
//! [`FilterController::handle_event`]. Only the resolution carrying the most
//! recently issued sequence number is ever applied.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::reconciler::CountReconciler;
use super::response::{count_rendered_items, FilterResponse};
use super::selection::{CategorySelectionStore, SelectionEffect, SelectionError};
use super::state::{CategoryId, FilterState, ItemType, Phase, Sequencer, SortKey};
use super::summary::{count_label, SummaryBinder, SummaryInput};
use crate::page::{EventKind, FocusState, ListenerRegistry, Notification, Page, Target, UiEvent};
use crate::storage::KeyValueStore;
use crate::transport::{CountSource, ItemSource, TransportError};

/// Quiet period after the last keystroke before a search request goes out.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Result of background work, delivered to the owning loop.
#[derive(Debug)]
pub enum FilterEvent {
    /// A primary listing request finished.
    ListingResolved {
        sequence: u64,
        result: Result<FilterResponse, TransportError>,
    },
    /// An advisory count request finished.
    AdvisoryCountResolved {
        categories: Vec<CategoryId>,
        result: Result<u64, TransportError>,
    },
}

/// Behaviour switches for one controller instance.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub item_type: ItemType,
    pub default_sort: SortKey,
    pub debounce: Duration,
    /// Per-request budget; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Refresh immediately when a category is toggled.
    pub filter_on_category_select: bool,
    /// Show the advisory "N products" count beside the selection.
    pub advisory_counts: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            item_type: ItemType::Products,
            default_sort: SortKey::default(),
            debounce: DEFAULT_DEBOUNCE,
            request_timeout: None,
            filter_on_category_select: true,
            advisory_counts: true,
        }
    }
}

/// External services a controller talks to.
pub struct Collaborators {
    pub items: Arc<dyn ItemSource>,
    /// `None` disables advisory counts regardless of options.
    pub counts: Option<Arc<dyn CountSource>>,
    pub storage: Arc<dyn KeyValueStore>,
}

/// Invoked after each applied listing.
pub type UpdateCallback = Box<dyn FnMut(&FilterResponse) + Send>;

/// Anything that can be told to re-run its filters.
pub trait FilterableView {
    fn apply_filters(&mut self);
}

struct InFlight {
    sequence: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct FilterController<P: Page> {
    page: P,
    state: FilterState,
    options: ControllerOptions,

    source: Arc<dyn ItemSource>,
    store: CategorySelectionStore,
    binder: SummaryBinder,
    reconciler: Option<CountReconciler>,
    event_tx: mpsc::Sender<FilterEvent>,

    sequencer: Sequencer,
    in_flight: Option<InFlight>,
    debounce_deadline: Option<Instant>,
    captured_focus: Option<FocusState>,

    listeners: ListenerRegistry,
    on_update: Option<UpdateCallback>,
    item_count: Option<u64>,
    error_shown: bool,
    initialized: bool,
    destroyed: bool,
}

impl<P: Page> FilterController<P> {
    /// Build a controller over `page` and rehydrate the saved selection.
    ///
    /// The saved selection is reflected on the page's checkboxes; nothing is
    /// fetched until [`initialize`](Self::initialize).
    pub async fn new(
        mut page: P,
        options: ControllerOptions,
        collaborators: Collaborators,
        event_tx: mpsc::Sender<FilterEvent>,
    ) -> Result<Self, SelectionError> {
        let available = page.category_options();
        let store = CategorySelectionStore::rehydrate(
            collaborators.storage,
            options.item_type,
            &available,
            options.filter_on_category_select,
        )
        .await?;
        store.apply_to_controls(&mut page);
        page.set_sort_value(options.default_sort);

        let reconciler = match collaborators.counts {
            Some(counts) if options.advisory_counts => {
                Some(CountReconciler::new(counts, event_tx.clone()))
            }
            _ => None,
        };

        tracing::debug!(
            item_type = options.item_type.as_str(),
            selected = store.len(),
            advisory = reconciler.is_some(),
            "Filter controller created"
        );

        Ok(Self {
            page,
            state: FilterState::new(options.item_type, options.default_sort),
            binder: SummaryBinder::new(options.item_type),
            options,
            source: collaborators.items,
            store,
            reconciler,
            event_tx,
            sequencer: Sequencer::default(),
            in_flight: None,
            debounce_deadline: None,
            captured_focus: None,
            listeners: ListenerRegistry::new(),
            on_update: None,
            item_count: None,
            error_shown: false,
            initialized: false,
            destroyed: false,
        })
    }

    /// Bind listeners, project the summaries and run the first filter pass.
    ///
    /// Runs once; later calls are no-ops.
    pub fn initialize(&mut self) {
        if self.initialized {
            tracing::debug!("Filter controller already initialized");
            return;
        }
        self.initialized = true;
        self.destroyed = false;

        let mut targets = vec![
            (Target::SearchInput, EventKind::Input),
            (Target::SortSelect, EventKind::Change),
            (Target::ApplyButton, EventKind::Click),
            (Target::ClearButton, EventKind::Click),
            (Target::Notification, EventKind::Click),
        ];
        targets.extend(
            self.page
                .category_options()
                .into_iter()
                .map(|id| (Target::CategoryOption(id), EventKind::Change)),
        );
        for (target, kind) in targets {
            self.listeners.bind(&mut self.page, target, kind);
        }
        self.binder.initialize(&mut self.page);

        self.refresh_summary();
        self.reconcile_counts();
        self.apply_filters();

        tracing::info!(
            listeners = self.listeners.len() + self.binder.listener_count(),
            selected = self.store.len(),
            "Filter controller initialized"
        );
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Record a new search term and (re)start the debounce window.
    pub fn update_search_term(&mut self, value: &str) {
        if self.destroyed {
            return;
        }
        self.state.search_term = value.to_string();
        self.debounce_deadline = Some(Instant::now() + self.options.debounce);
        self.refresh_summary();
    }

    /// When the pending search should fire, if one is pending.
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce_deadline
    }

    /// Fire the pending search if its deadline has passed.
    ///
    /// Returns true if a request was issued.
    pub fn poll_debounce(&mut self, now: Instant) -> bool {
        match self.debounce_deadline {
            Some(deadline) if deadline <= now => {
                self.apply_filters();
                true
            }
            _ => false,
        }
    }

    /// Change the sort order and refresh immediately.
    pub fn update_sort(&mut self, key: SortKey) {
        if self.destroyed {
            return;
        }
        self.state.sort_key = key;
        self.page.set_sort_value(key);
        self.apply_filters();
    }

    /// React to a changed selection: summaries, advisory count, refresh.
    pub fn on_category_selection_changed(&mut self) {
        if self.destroyed {
            return;
        }
        self.refresh_summary();
        self.reconcile_counts();
        self.apply_filters();
    }

    pub async fn select_category(&mut self, id: CategoryId) {
        let result = self.store.select(id).await;
        self.settle_selection(result);
    }

    pub async fn deselect_category(&mut self, id: &CategoryId) {
        let result = self.store.deselect(id).await;
        self.settle_selection(result);
    }

    pub async fn toggle_category(&mut self, id: CategoryId) {
        let result = self.store.toggle(id).await;
        self.settle_selection(result);
    }

    pub async fn clear_categories(&mut self) {
        let result = self.store.clear().await;
        self.settle_selection(result);
    }

    /// Open or close the filter panel.
    pub fn toggle_filters_panel(&mut self) {
        let expanded = !self.binder.filters_expanded();
        self.binder.set_filters_expanded(&mut self.page, expanded);
    }

    /// Route an event delivered by a bound listener.
    pub async fn handle_ui_event(&mut self, event: UiEvent) {
        if self.destroyed {
            tracing::debug!(?event, "Ignoring UI event after teardown");
            return;
        }
        match event {
            UiEvent::SearchInput(value) => self.update_search_term(&value),
            UiEvent::SortChanged(key) => self.update_sort(key),
            UiEvent::CategoryToggled(id) => self.toggle_category(id).await,
            UiEvent::FiltersToggled => self.toggle_filters_panel(),
            UiEvent::ApplyFilters => self.apply_filters(),
            UiEvent::ClearCategories => self.clear_categories().await,
            UiEvent::Retry => self.retry(),
            UiEvent::DismissNotification => {
                self.page.dismiss_notification();
                self.error_shown = false;
            }
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Snapshot the state and issue a listing request.
    ///
    /// Any in-flight request is cancelled first, and a pending debounce is
    /// consumed.
    pub fn apply_filters(&mut self) {
        if self.destroyed {
            return;
        }
        self.debounce_deadline = None;
        self.cancel_in_flight("superseded");

        let query = self.state.to_query(self.store.selected());
        self.captured_focus = self.page.capture_focus();
        let sequence = self.sequencer.issue();
        self.page.set_loading(true);

        tracing::debug!(
            sequence,
            search = %query.search,
            sort = query.sort.as_param(),
            categories = query.categories.len(),
            "Issuing filter request"
        );

        let source = Arc::clone(&self.source);
        let tx = self.event_tx.clone();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let timeout = self.options.request_timeout;

        let handle = tokio::spawn(async move {
            let fetch = source.fetch(&query, task_cancel);
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, fetch)
                    .await
                    .unwrap_or_else(|_| Err(TransportError::Timeout(limit))),
                None => fetch.await,
            };
            let event = FilterEvent::ListingResolved { sequence, result };
            if let Err(e) = tx.send(event).await {
                tracing::warn!(sequence, error = %e, "Failed to send filter result (receiver dropped)");
            }
        });

        self.in_flight = Some(InFlight {
            sequence,
            cancel,
            handle,
        });
    }

    /// Dismiss the current notice and issue the request again.
    pub fn retry(&mut self) {
        if self.destroyed {
            return;
        }
        tracing::info!(sequence = self.sequencer.last_issued(), "Retrying filter request");
        self.page.dismiss_notification();
        self.error_shown = false;
        self.apply_filters();
    }

    /// Apply a background result.
    pub fn handle_event(&mut self, event: FilterEvent) {
        if self.destroyed {
            return;
        }
        match event {
            FilterEvent::ListingResolved { sequence, result } => {
                self.handle_listing_resolved(sequence, result)
            }
            FilterEvent::AdvisoryCountResolved { categories, result } => {
                self.handle_advisory_count(&categories, result)
            }
        }
    }

    fn handle_listing_resolved(
        &mut self,
        sequence: u64,
        result: Result<FilterResponse, TransportError>,
    ) {
        if !self.sequencer.is_current(sequence) {
            tracing::debug!(
                sequence,
                current = self.sequencer.last_issued(),
                "Ignoring stale filter response"
            );
            return;
        }
        if self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.sequence == sequence)
        {
            self.in_flight = None;
        }
        self.page.set_loading(false);

        match result {
            Ok(response) => self.apply_response(sequence, response),
            Err(e) if e.is_aborted() => {
                tracing::debug!(sequence, "Filter request aborted");
                self.captured_focus = None;
            }
            Err(e) => {
                tracing::warn!(
                    sequence,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Filter request failed"
                );
                self.captured_focus = None;
                self.page
                    .notify(Notification::retryable_error(e.user_message()));
                self.error_shown = true;
            }
        }
    }

    fn apply_response(&mut self, sequence: u64, response: FilterResponse) {
        match response.markup.as_deref() {
            Some(markup) => self.page.set_content(markup),
            None => tracing::warn!(sequence, "Filter response carried no markup, keeping current items"),
        }

        let count = match response.explicit_count() {
            Some(count) => count,
            None => {
                let count = count_rendered_items(self.page.content());
                tracing::debug!(sequence, count, "No count in response, counted rendered items");
                count
            }
        };
        self.item_count = Some(count);
        self.binder.update_item_count_displays(&mut self.page, count);
        self.refresh_summary();

        if let Some(focus) = self.captured_focus.take() {
            self.page.restore_focus(&focus);
        }
        if self.error_shown {
            self.page.dismiss_notification();
            self.error_shown = false;
        }
        if let Some(callback) = self.on_update.as_mut() {
            callback(&response);
        }

        tracing::debug!(sequence, count, "Filter results applied");
    }

    fn handle_advisory_count(&mut self, categories: &[CategoryId], result: Result<u64, TransportError>) {
        if self.store.is_empty() {
            tracing::debug!(
                categories = categories.len(),
                "Discarding advisory count for an emptied selection"
            );
            return;
        }
        match result {
            Ok(count) => {
                let label = count_label(count, ItemType::Products);
                self.page.set_text(&Target::AdvisoryCount, &label);
                self.page.set_visible(&Target::AdvisoryCount, true);
            }
            Err(e) if e.is_aborted() => {}
            Err(e) => {
                tracing::debug!(error = %e, "Advisory count failed");
                self.page.set_visible(&Target::AdvisoryCount, false);
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Cancel pending work and unbind every listener this controller bound.
    ///
    /// Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.initialized = false;
        self.debounce_deadline = None;
        self.cancel_in_flight("teardown");
        self.page.set_loading(false);

        let removed = self.listeners.unbind_all(&mut self.page);
        self.binder.destroy(&mut self.page);
        self.store.destroy();
        if let Some(reconciler) = self.reconciler.as_mut() {
            reconciler.destroy();
        }

        tracing::info!(removed, "Filter controller destroyed");
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn phase(&self) -> Phase {
        if self.debounce_deadline.is_some() {
            Phase::Debouncing
        } else if let Some(in_flight) = &self.in_flight {
            Phase::Requesting {
                sequence: in_flight.sequence,
            }
        } else {
            Phase::Idle
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn selected(&self) -> &[CategoryId] {
        self.store.selected()
    }

    pub fn is_selected(&self, id: &CategoryId) -> bool {
        self.store.is_selected(id)
    }

    /// Item count of the last applied listing.
    pub fn item_count(&self) -> Option<u64> {
        self.item_count
    }

    pub fn filters_expanded(&self) -> bool {
        self.binder.filters_expanded()
    }

    pub fn last_issued_sequence(&self) -> u64 {
        self.sequencer.last_issued()
    }

    pub fn set_on_update(&mut self, callback: UpdateCallback) {
        self.on_update = Some(callback);
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    fn settle_selection(&mut self, result: Result<SelectionEffect, SelectionError>) {
        if self.destroyed {
            return;
        }
        self.store.apply_to_controls(&mut self.page);

        let effect = match result {
            Ok(effect) => effect,
            Err(e) => {
                // Memory already holds the change; only the saved copy is behind.
                tracing::warn!(error = %e, "Category selection not saved");
                self.page.notify(Notification::error(
                    "Couldn't save your category selection.",
                ));
                if self.store.filter_on_select() {
                    SelectionEffect::Refresh
                } else {
                    SelectionEffect::SummaryOnly
                }
            }
        };

        match effect {
            SelectionEffect::Unchanged => {}
            SelectionEffect::Refresh => self.on_category_selection_changed(),
            SelectionEffect::SummaryOnly => {
                self.refresh_summary();
                self.reconcile_counts();
            }
        }
    }

    fn refresh_summary(&mut self) {
        let input = SummaryInput {
            search_term: &self.state.search_term,
            selected_count: self.store.len(),
        };
        self.binder.update_filter_summary(&mut self.page, input);
    }

    fn reconcile_counts(&mut self) {
        if let Some(reconciler) = self.reconciler.as_mut() {
            reconciler.reconcile(&mut self.page, self.store.selected());
        }
    }

    fn cancel_in_flight(&mut self, reason: &'static str) {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel.cancel();
            previous.handle.abort();
            tracing::debug!(sequence = previous.sequence, reason, "Cancelled in-flight filter request");
        }
    }
}

impl<P: Page> FilterableView for FilterController<P> {
    fn apply_filters(&mut self) {
        FilterController::apply_filters(self);
    }
}

impl<P: Page> Drop for FilterController<P> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
            in_flight.handle.abort();
        }
    }
}
