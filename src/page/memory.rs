use std::collections::HashMap;
use tokio::time::Instant;

use super::{
    CategoryOption, EventKind, FocusState, ListenerId, Notification, Page, Target, UiEvent,
};
use crate::filter::{CategoryId, SortKey};

/// In-memory document.
///
/// Holds everything a browser page would: the rendered listing markup, form
/// control values, element text and visibility, the toast slot and the set of
/// bound listeners. The terminal front end renders from it and feeds key
/// presses into it through [`MemoryPage::dispatch`].
pub struct MemoryPage {
    options: Vec<CategoryOption>,
    content: String,
    loading: bool,
    texts: HashMap<Target, String>,
    visible: HashMap<Target, bool>,
    checked: HashMap<Target, bool>,

    search_value: String,
    /// Caret as (start, end) char offsets into `search_value`.
    caret: (usize, usize),
    focused: Option<Target>,
    sort_value: SortKey,

    notification: Option<(Notification, Instant)>,

    listeners: HashMap<ListenerId, (Target, EventKind)>,
    next_listener: u64,
}

impl MemoryPage {
    pub fn new(options: Vec<CategoryOption>) -> Self {
        Self {
            options,
            content: String::new(),
            loading: false,
            texts: HashMap::new(),
            visible: HashMap::new(),
            checked: HashMap::new(),
            search_value: String::new(),
            caret: (0, 0),
            focused: Some(Target::SearchInput),
            sort_value: SortKey::default(),
            notification: None,
            listeners: HashMap::new(),
            next_listener: 1,
        }
    }

    // ========================================================================
    // User Interaction
    // ========================================================================

    /// Fire `kind` on `target`.
    ///
    /// Returns the event a bound listener would receive, or `None` if nothing
    /// listens there (or the element is a hidden button).
    pub fn dispatch(&mut self, target: &Target, kind: EventKind) -> Option<UiEvent> {
        let listening = self
            .listeners
            .values()
            .any(|(t, k)| t == target && *k == kind);
        if !listening {
            return None;
        }

        match (target, kind) {
            (Target::SearchInput, EventKind::Input) => {
                Some(UiEvent::SearchInput(self.search_value.clone()))
            }
            (Target::SortSelect, EventKind::Change) => Some(UiEvent::SortChanged(self.sort_value)),
            (Target::CategoryOption(id), EventKind::Change) => {
                Some(UiEvent::CategoryToggled(id.clone()))
            }
            (Target::FilterToggle, EventKind::Click) => Some(UiEvent::FiltersToggled),
            (Target::ApplyButton, EventKind::Click) => Some(UiEvent::ApplyFilters),
            (Target::ListButtonCollapsed | Target::ListButtonExpanded, EventKind::Click) => {
                self.is_visible(target).then_some(UiEvent::ApplyFilters)
            }
            (Target::ClearButton, EventKind::Click) => Some(UiEvent::ClearCategories),
            (Target::Notification, EventKind::Click) => match &self.notification {
                Some((n, _)) if n.retryable => Some(UiEvent::Retry),
                Some(_) => Some(UiEvent::DismissNotification),
                None => None,
            },
            _ => None,
        }
    }

    /// Insert a character at the caret, replacing any selection.
    pub fn insert_char(&mut self, c: char) {
        let (start, end) = self.caret;
        let mut chars: Vec<char> = self.search_value.chars().collect();
        let end = end.min(chars.len());
        let start = start.min(end);
        chars.drain(start..end);
        chars.insert(start, c);
        self.search_value = chars.into_iter().collect();
        self.caret = (start + 1, start + 1);
        self.focused = Some(Target::SearchInput);
    }

    /// Delete the selection or the character before the caret.
    pub fn backspace(&mut self) {
        let (start, end) = self.caret;
        let mut chars: Vec<char> = self.search_value.chars().collect();
        let end = end.min(chars.len());
        let start = start.min(end);
        let new_caret = if start != end {
            chars.drain(start..end);
            start
        } else if start > 0 {
            chars.remove(start - 1);
            start - 1
        } else {
            return;
        };
        self.search_value = chars.into_iter().collect();
        self.caret = (new_caret, new_caret);
    }

    /// Replace the search input value, caret at the end.
    pub fn set_search_value(&mut self, value: &str) {
        self.search_value = value.to_string();
        let len = self.search_value.chars().count();
        self.caret = (len, len);
    }

    pub fn search_value(&self) -> &str {
        &self.search_value
    }

    pub fn caret(&self) -> (usize, usize) {
        self.caret
    }

    pub fn select_sort(&mut self, key: SortKey) {
        self.sort_value = key;
    }

    pub fn sort_value(&self) -> SortKey {
        self.sort_value
    }

    pub fn focus(&mut self, target: Target) {
        self.focused = Some(target);
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<&Target> {
        self.focused.as_ref()
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn options(&self) -> &[CategoryOption] {
        &self.options
    }

    pub fn text(&self, target: &Target) -> Option<&str> {
        self.texts.get(target).map(String::as_str)
    }

    /// Elements are hidden until something shows them.
    pub fn is_visible(&self, target: &Target) -> bool {
        self.visible.get(target).copied().unwrap_or(false)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref().map(|(n, _)| n)
    }

    /// Drop a non-retryable notification older than [`Notification::TTL`].
    ///
    /// Returns true if one was cleared.
    pub fn clear_expired_notification(&mut self) -> bool {
        if let Some((n, shown_at)) = &self.notification {
            if !n.retryable && shown_at.elapsed() >= Notification::TTL {
                self.notification = None;
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Page for MemoryPage {
    fn set_content(&mut self, markup: &str) {
        self.content = markup.to_string();
        // Replacing the content region drops focus, as a DOM swap would.
        self.focused = None;
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn set_text(&mut self, target: &Target, text: &str) {
        self.texts.insert(target.clone(), text.to_string());
    }

    fn set_visible(&mut self, target: &Target, visible: bool) {
        self.visible.insert(target.clone(), visible);
    }

    fn set_checked(&mut self, target: &Target, checked: bool) {
        self.checked.insert(target.clone(), checked);
    }

    fn is_checked(&self, target: &Target) -> bool {
        self.checked.get(target).copied().unwrap_or(false)
    }

    fn set_sort_value(&mut self, key: SortKey) {
        self.sort_value = key;
    }

    fn category_options(&self) -> Vec<CategoryId> {
        self.options.iter().map(|o| o.id.clone()).collect()
    }

    fn capture_focus(&self) -> Option<FocusState> {
        match &self.focused {
            Some(Target::SearchInput) => Some(FocusState {
                target: Target::SearchInput,
                value: self.search_value.clone(),
                selection_start: self.caret.0,
                selection_end: self.caret.1,
            }),
            Some(other) => Some(FocusState {
                target: other.clone(),
                value: String::new(),
                selection_start: 0,
                selection_end: 0,
            }),
            None => None,
        }
    }

    fn restore_focus(&mut self, state: &FocusState) {
        self.focused = Some(state.target.clone());
        // Typed while the request was out: the live caret is the right one
        if state.target == Target::SearchInput && state.value == self.search_value {
            let len = self.search_value.chars().count();
            let end = state.selection_end.min(len);
            let start = state.selection_start.min(end);
            self.caret = (start, end);
        }
    }

    fn notify(&mut self, notification: Notification) {
        self.notification = Some((notification, Instant::now()));
    }

    fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    fn add_listener(&mut self, target: &Target, kind: EventKind) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id, (target.clone(), kind));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }
}
