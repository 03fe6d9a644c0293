//! The rendering surface the filter subsystem drives.
//!
//! [`Page`] is the document: addressable elements ([`Target`]), a content
//! region that listings are rendered into, form controls, a notification
//! slot, and event listeners. Listener bookkeeping lives in
//! [`ListenerRegistry`], owned by whichever component bound the listeners,
//! so bind and unbind stay symmetric without inspecting the page.

mod memory;

use std::collections::HashMap;
use std::time::Duration;

use crate::filter::{CategoryId, SortKey};

pub use memory::MemoryPage;

/// Addressable element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    SearchInput,
    SortSelect,
    CategoryOption(CategoryId),
    FilterToggle,
    ApplyButton,
    ClearButton,
    ListButtonCollapsed,
    ListButtonExpanded,
    ItemCount,
    FilterBadge,
    CategoryBadge,
    AdvisoryCount,
    Notification,
}

/// DOM-style event kinds a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Input,
    Change,
    Click,
}

/// Handle returned by [`Page::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Event delivered to the controller by a bound listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    SearchInput(String),
    SortChanged(SortKey),
    CategoryToggled(CategoryId),
    FiltersToggled,
    ApplyFilters,
    ClearCategories,
    Retry,
    DismissNotification,
}

/// Focus and caret position of a text input.
///
/// `value` is the input's text at capture time. A caret is only meaningful
/// against that text, so it is not restored once the value has changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusState {
    pub target: Target,
    pub value: String,
    pub selection_start: usize,
    pub selection_end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Dismissible toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// Offers a retry action; retryable notices stay until dismissed.
    pub retryable: bool,
}

impl Notification {
    /// Non-retryable notices auto-dismiss after this long.
    pub const TTL: Duration = Duration::from_secs(5);

    pub fn retryable_error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
            retryable: false,
        }
    }
}

/// A category checkbox offered on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOption {
    pub id: CategoryId,
    pub name: String,
}

/// The document surface.
pub trait Page {
    // Content region
    fn set_content(&mut self, markup: &str);
    fn content(&self) -> &str;
    fn set_loading(&mut self, loading: bool);

    // Element projections
    fn set_text(&mut self, target: &Target, text: &str);
    fn set_visible(&mut self, target: &Target, visible: bool);
    fn set_checked(&mut self, target: &Target, checked: bool);
    fn is_checked(&self, target: &Target) -> bool;
    fn set_sort_value(&mut self, key: SortKey);

    /// Category options currently rendered.
    fn category_options(&self) -> Vec<CategoryId>;

    // Focus
    fn capture_focus(&self) -> Option<FocusState>;
    fn restore_focus(&mut self, state: &FocusState);

    // Notifications
    fn notify(&mut self, notification: Notification);
    fn dismiss_notification(&mut self);

    // Listeners
    fn add_listener(&mut self, target: &Target, kind: EventKind) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId) -> bool;
}

// ============================================================================
// Listener Registry
// ============================================================================

/// Record of one bound handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundHandler {
    pub listener: ListenerId,
    pub kind: EventKind,
}

/// Element-to-handler map owned by the component that bound the handlers.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    bound: HashMap<(Target, EventKind), BoundHandler>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `kind` on `target` unless this registry already did.
    ///
    /// Returns true if a new listener was added.
    pub fn bind(&mut self, page: &mut dyn Page, target: Target, kind: EventKind) -> bool {
        let key = (target, kind);
        if self.bound.contains_key(&key) {
            return false;
        }
        let listener = page.add_listener(&key.0, kind);
        self.bound.insert(key, BoundHandler { listener, kind });
        true
    }

    /// Unbind a single handler. Returns true if one was bound.
    pub fn unbind(&mut self, page: &mut dyn Page, target: &Target, kind: EventKind) -> bool {
        match self.bound.remove(&(target.clone(), kind)) {
            Some(handler) => page.remove_listener(handler.listener),
            None => false,
        }
    }

    /// Unbind everything this registry bound. Returns the number removed.
    pub fn unbind_all(&mut self, page: &mut dyn Page) -> usize {
        let mut removed = 0;
        for (_, handler) in self.bound.drain() {
            if page.remove_listener(handler.listener) {
                removed += 1;
            }
        }
        removed
    }

    pub fn is_bound(&self, target: &Target, kind: EventKind) -> bool {
        self.bound.contains_key(&(target.clone(), kind))
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}
