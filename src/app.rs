//! Terminal application state wrapped around the filter controller.

use crate::filter::{item_offsets, FilterController, FilterEvent};
use crate::page::{CategoryOption, MemoryPage, Page};
use crate::util::markup_text;

/// Which region has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Search,
    Categories,
    Listing,
}

pub struct App {
    pub controller: FilterController<MemoryPage>,
    pub focus: Focus,
    /// Highlighted row in the category panel.
    pub category_cursor: usize,
    /// Highlighted row in the listing.
    pub listing_cursor: usize,
    /// One line per rendered item, rebuilt whenever the listing changes.
    pub listing: Vec<String>,
    /// Shown in the title bar.
    pub storefront: String,
    pub needs_redraw: bool,
    pub spinner_frame: usize,
}

impl App {
    pub fn new(controller: FilterController<MemoryPage>, storefront: impl Into<String>) -> Self {
        let mut app = Self {
            controller,
            focus: Focus::Search,
            category_cursor: 0,
            listing_cursor: 0,
            listing: Vec::new(),
            storefront: storefront.into(),
            needs_redraw: true,
            spinner_frame: 0,
        };
        app.sync_listing();
        app
    }

    pub fn page(&self) -> &MemoryPage {
        self.controller.page()
    }

    /// Apply a background result and refresh derived view state.
    pub fn handle_filter_event(&mut self, event: FilterEvent) {
        self.controller.handle_event(event);
        self.sync_listing();
        self.needs_redraw = true;
    }

    /// Rebuild [`listing`](Self::listing) from the page content.
    pub fn sync_listing(&mut self) {
        self.listing = listing_lines(self.controller.page().content());
        self.listing_cursor = self
            .listing_cursor
            .min(self.listing.len().saturating_sub(1));
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Move focus to the next region; the category panel only while open.
    pub fn cycle_focus(&mut self) {
        let panel_open = self.controller.filters_expanded();
        self.focus = match self.focus {
            Focus::Search if panel_open => Focus::Categories,
            Focus::Search | Focus::Categories => Focus::Listing,
            Focus::Listing => Focus::Search,
        };
    }

    /// Pull focus out of the category panel once it closes.
    pub fn clamp_focus(&mut self) {
        if self.focus == Focus::Categories && !self.controller.filters_expanded() {
            self.focus = Focus::Search;
        }
    }

    pub fn nav_up(&mut self) {
        match self.focus {
            Focus::Categories => self.category_cursor = self.category_cursor.saturating_sub(1),
            Focus::Listing => self.listing_cursor = self.listing_cursor.saturating_sub(1),
            Focus::Search => {}
        }
    }

    pub fn nav_down(&mut self) {
        match self.focus {
            Focus::Categories => {
                let max_index = self.page().options().len().saturating_sub(1);
                self.category_cursor = self.category_cursor.saturating_add(1).min(max_index);
            }
            Focus::Listing => {
                let max_index = self.listing.len().saturating_sub(1);
                self.listing_cursor = self.listing_cursor.saturating_add(1).min(max_index);
            }
            Focus::Search => {}
        }
    }

    pub fn cursor_category(&self) -> Option<&CategoryOption> {
        self.page().options().get(self.category_cursor)
    }

    /// Drop an expired notice. Returns true if the screen changed.
    pub fn clear_expired_notification(&mut self) -> bool {
        self.controller.page_mut().clear_expired_notification()
    }
}

/// Split listing markup into one line of text per item.
///
/// Markup without recognizable items collapses to a single line, or to
/// nothing if it has no visible text.
pub fn listing_lines(markup: &str) -> Vec<String> {
    let offsets = item_offsets(markup);
    if offsets.is_empty() {
        let text = markup_text(markup);
        return if text.is_empty() { Vec::new() } else { vec![text] };
    }
    offsets
        .iter()
        .enumerate()
        .map(|(i, start)| {
            let end = offsets.get(i + 1).copied().unwrap_or(markup.len());
            markup_text(&markup[*start..end])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{
        CategoryId, Collaborators, ControllerOptions, FilterQuery, FilterResponse,
    };
    use crate::page::{CategoryOption, Target};
    use crate::storage::MemoryStore;
    use crate::transport::{ItemSource, TransportError};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    struct TwoBoots;

    impl ItemSource for TwoBoots {
        fn fetch<'a>(
            &'a self,
            _query: &'a FilterQuery,
            _cancel: CancellationToken,
        ) -> BoxFuture<'a, Result<FilterResponse, TransportError>> {
            async {
                Ok(FilterResponse::from_markup(
                    r#"<div class="product-card"><h3>Red Boots</h3></div><div class="product-card"><h3>Blue Boots</h3></div>"#,
                ))
            }
            .boxed()
        }
    }

    async fn test_app() -> (App, mpsc::Receiver<FilterEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let page = MemoryPage::new(vec![
            CategoryOption {
                id: CategoryId::from("3"),
                name: "Boots".to_string(),
            },
            CategoryOption {
                id: CategoryId::from("7"),
                name: "Sandals".to_string(),
            },
        ]);
        let controller = FilterController::new(
            page,
            ControllerOptions::default(),
            Collaborators {
                items: Arc::new(TwoBoots),
                counts: None,
                storage: Arc::new(MemoryStore::new()),
            },
            tx,
        )
        .await
        .unwrap();
        (App::new(controller, "http://shop.test"), rx)
    }

    #[test]
    fn test_listing_lines_per_item() {
        let markup = r#"<ul><li data-item-id="1">Hat <b>£10</b></li><li data-item-id="2">Scarf</li></ul>"#;
        assert_eq!(listing_lines(markup), vec!["Hat £10", "Scarf"]);
    }

    #[test]
    fn test_listing_lines_without_items() {
        assert_eq!(listing_lines("<p>No products found.</p>"), vec!["No products found."]);
        assert!(listing_lines("  <div></div> ").is_empty());
    }

    #[tokio::test]
    async fn test_listing_follows_applied_results() {
        let (mut app, mut rx) = test_app().await;
        app.controller.initialize();
        let event = rx.recv().await.unwrap();
        app.handle_filter_event(event);

        assert_eq!(app.listing, vec!["Red Boots", "Blue Boots"]);
        assert_eq!(app.page().text(&Target::ItemCount), Some("2 products"));
    }

    #[tokio::test]
    async fn test_focus_skips_closed_panel() {
        let (mut app, _rx) = test_app().await;
        assert_eq!(app.focus, Focus::Search);
        app.cycle_focus();
        assert_eq!(app.focus, Focus::Listing);

        app.controller.toggle_filters_panel();
        app.cycle_focus();
        app.cycle_focus();
        assert_eq!(app.focus, Focus::Categories);

        app.controller.toggle_filters_panel();
        app.clamp_focus();
        assert_eq!(app.focus, Focus::Search);
    }

    #[tokio::test]
    async fn test_category_cursor_clamped() {
        let (mut app, _rx) = test_app().await;
        app.focus = Focus::Categories;
        for _ in 0..5 {
            app.nav_down();
        }
        assert_eq!(app.cursor_category().map(|o| o.name.as_str()), Some("Sandals"));
        app.nav_up();
        app.nav_up();
        assert_eq!(app.category_cursor, 0);
    }
}
