//! Projection of filter state onto badges, labels and the "List" buttons.
//!
//! Every projection overwrites the element it owns, so calling it again with
//! the same inputs leaves the page unchanged. The binder never touches
//! [`FilterState`](super::FilterState); it only reads what it is handed.

use super::state::ItemType;
use crate::page::{EventKind, ListenerRegistry, Page, Target};

/// Inputs for [`SummaryBinder::update_filter_summary`].
#[derive(Debug, Clone, Copy)]
pub struct SummaryInput<'a> {
    pub search_term: &'a str,
    pub selected_count: usize,
}

impl SummaryInput<'_> {
    /// Number of active filters; a non-empty search counts as one.
    pub fn active_filters(&self) -> usize {
        usize::from(!self.search_term.trim().is_empty()) + self.selected_count
    }
}

/// Whether the collapsed "List" button shows.
pub fn collapsed_list_visible(filters_expanded: bool, has_selected: bool) -> bool {
    !filters_expanded && has_selected
}

/// Whether the expanded "List" button shows.
pub fn expanded_list_visible(filters_expanded: bool) -> bool {
    filters_expanded
}

/// `"1 product"`, `"12 products"`, ...
pub fn count_label(count: u64, item_type: ItemType) -> String {
    let (singular, plural) = item_type.nouns();
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// Keeps summary elements consistent with filter state.
pub struct SummaryBinder {
    item_type: ItemType,
    filters_expanded: bool,
    has_selected: bool,
    listeners: ListenerRegistry,
}

impl SummaryBinder {
    const OWNED_LISTENERS: [(Target, EventKind); 3] = [
        (Target::FilterToggle, EventKind::Click),
        (Target::ListButtonCollapsed, EventKind::Click),
        (Target::ListButtonExpanded, EventKind::Click),
    ];

    pub fn new(item_type: ItemType) -> Self {
        Self {
            item_type,
            filters_expanded: false,
            has_selected: false,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Bind the filter-panel toggle and both "List" buttons.
    ///
    /// Idempotent: already-bound handlers are not bound again.
    pub fn initialize(&mut self, page: &mut dyn Page) {
        let mut added = 0;
        for (target, kind) in Self::OWNED_LISTENERS {
            if self.listeners.bind(page, target, kind) {
                added += 1;
            }
        }
        if added > 0 {
            tracing::debug!(added, "Summary listeners bound");
        }
        self.project_toggle(page);
    }

    /// Remove every listener this binder bound.
    pub fn destroy(&mut self, page: &mut dyn Page) {
        let removed = self.listeners.unbind_all(page);
        tracing::debug!(removed, "Summary listeners unbound");
    }

    pub fn filters_expanded(&self) -> bool {
        self.filters_expanded
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Open or close the filter panel.
    pub fn set_filters_expanded(&mut self, page: &mut dyn Page, expanded: bool) {
        self.filters_expanded = expanded;
        self.project_toggle(page);
    }

    /// Write the item count into every count display.
    pub fn update_item_count_displays(&self, page: &mut dyn Page, count: u64) {
        page.set_text(&Target::ItemCount, &count_label(count, self.item_type));
        page.set_visible(&Target::ItemCount, true);
    }

    /// Project search term and selection size onto the badges and buttons.
    pub fn update_filter_summary(&mut self, page: &mut dyn Page, input: SummaryInput<'_>) {
        let active = input.active_filters();
        page.set_text(&Target::FilterBadge, &active.to_string());
        page.set_visible(&Target::FilterBadge, active > 0);

        page.set_text(&Target::CategoryBadge, &input.selected_count.to_string());
        page.set_visible(&Target::CategoryBadge, input.selected_count > 0);

        self.has_selected = input.selected_count > 0;
        self.project_toggle(page);
    }

    fn project_toggle(&self, page: &mut dyn Page) {
        let label = if self.filters_expanded {
            "Hide filters"
        } else {
            "Show filters"
        };
        page.set_text(&Target::FilterToggle, label);
        page.set_visible(&Target::FilterToggle, true);
        page.set_visible(
            &Target::ListButtonCollapsed,
            collapsed_list_visible(self.filters_expanded, self.has_selected),
        );
        page.set_visible(
            &Target::ListButtonExpanded,
            expanded_list_visible(self.filters_expanded),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryPage;

    fn input(search_term: &str, selected_count: usize) -> SummaryInput<'_> {
        SummaryInput {
            search_term,
            selected_count,
        }
    }

    #[test]
    fn test_collapsed_rule_truth_table() {
        assert!(!collapsed_list_visible(false, false));
        assert!(collapsed_list_visible(false, true));
        assert!(!collapsed_list_visible(true, false));
        assert!(!collapsed_list_visible(true, true));
    }

    #[test]
    fn test_initialize_binds_once() {
        let mut page = MemoryPage::new(Vec::new());
        let mut binder = SummaryBinder::new(ItemType::Products);
        binder.initialize(&mut page);
        binder.initialize(&mut page);
        assert_eq!(page.listener_count(), 3);
        assert_eq!(binder.listener_count(), 3);
    }

    #[test]
    fn test_destroy_removes_all_listeners() {
        let mut page = MemoryPage::new(Vec::new());
        let mut binder = SummaryBinder::new(ItemType::Products);
        binder.initialize(&mut page);
        binder.destroy(&mut page);
        assert_eq!(page.listener_count(), 0);
        assert_eq!(binder.listener_count(), 0);

        // Re-initializing after destroy binds a fresh set
        binder.initialize(&mut page);
        assert_eq!(page.listener_count(), 3);
    }

    #[test]
    fn test_badges_follow_search_and_selection() {
        let mut page = MemoryPage::new(Vec::new());
        let mut binder = SummaryBinder::new(ItemType::Products);

        binder.update_filter_summary(&mut page, input("", 0));
        assert!(!page.is_visible(&Target::FilterBadge));
        assert!(!page.is_visible(&Target::CategoryBadge));

        binder.update_filter_summary(&mut page, input("boots", 2));
        assert!(page.is_visible(&Target::FilterBadge));
        assert_eq!(page.text(&Target::FilterBadge), Some("3"));
        assert_eq!(page.text(&Target::CategoryBadge), Some("2"));
    }

    #[test]
    fn test_whitespace_search_is_not_a_filter() {
        assert_eq!(input("   ", 0).active_filters(), 0);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let mut once = MemoryPage::new(Vec::new());
        let mut twice = MemoryPage::new(Vec::new());
        let mut a = SummaryBinder::new(ItemType::Products);
        let mut b = SummaryBinder::new(ItemType::Products);

        a.update_filter_summary(&mut once, input("hat", 1));
        a.update_item_count_displays(&mut once, 4);

        for _ in 0..3 {
            b.update_filter_summary(&mut twice, input("hat", 1));
            b.update_item_count_displays(&mut twice, 4);
        }

        for target in [
            Target::FilterBadge,
            Target::CategoryBadge,
            Target::ItemCount,
            Target::FilterToggle,
            Target::ListButtonCollapsed,
            Target::ListButtonExpanded,
        ] {
            assert_eq!(once.text(&target), twice.text(&target));
            assert_eq!(once.is_visible(&target), twice.is_visible(&target));
        }
    }

    #[test]
    fn test_list_buttons_track_panel_and_selection() {
        let mut page = MemoryPage::new(Vec::new());
        let mut binder = SummaryBinder::new(ItemType::Products);
        binder.initialize(&mut page);

        binder.update_filter_summary(&mut page, input("", 1));
        assert!(page.is_visible(&Target::ListButtonCollapsed));
        assert!(!page.is_visible(&Target::ListButtonExpanded));

        binder.set_filters_expanded(&mut page, true);
        assert!(!page.is_visible(&Target::ListButtonCollapsed));
        assert!(page.is_visible(&Target::ListButtonExpanded));
        assert_eq!(page.text(&Target::FilterToggle), Some("Hide filters"));

        binder.set_filters_expanded(&mut page, false);
        binder.update_filter_summary(&mut page, input("", 0));
        assert!(!page.is_visible(&Target::ListButtonCollapsed));
    }

    #[test]
    fn test_count_labels() {
        assert_eq!(count_label(1, ItemType::Products), "1 product");
        assert_eq!(count_label(0, ItemType::Products), "0 products");
        assert_eq!(count_label(3, ItemType::Categories), "3 categories");
    }
}
