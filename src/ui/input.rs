//! Keyboard handling.
//!
//! Keys edit the page's controls and then fire the matching DOM-style event
//! through [`MemoryPage::dispatch`](crate::page::MemoryPage::dispatch). The
//! controller only hears about events it has a listener bound for.

use crate::app::{App, Focus};
use crate::page::{EventKind, Target, UiEvent};
use crate::util::MAX_SEARCH_TERM_LENGTH;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};

use super::Action;

/// Main input dispatch function.
pub(super) async fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
) -> Result<Action> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(handle_control_key(app, code).await);
    }

    match code {
        KeyCode::Tab => app.cycle_focus(),
        KeyCode::Esc => {
            app.controller
                .handle_ui_event(UiEvent::DismissNotification)
                .await
        }
        KeyCode::F(2) => {
            let next = app.page().sort_value().next();
            app.controller.page_mut().select_sort(next);
            fire(app, Target::SortSelect, EventKind::Change).await;
        }
        KeyCode::Enter => press_list_button(app).await,
        _ => match app.focus {
            Focus::Search => handle_search_key(app, code).await,
            Focus::Categories => handle_category_key(app, code).await,
            Focus::Listing => match code {
                KeyCode::Up | KeyCode::Char('k') => app.nav_up(),
                KeyCode::Down | KeyCode::Char('j') => app.nav_down(),
                _ => {}
            },
        },
    }
    Ok(Action::Continue)
}

async fn handle_control_key(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Char('c') => return Action::Quit,
        KeyCode::Char('f') => {
            fire(app, Target::FilterToggle, EventKind::Click).await;
            app.clamp_focus();
        }
        KeyCode::Char('r') => app.controller.handle_ui_event(UiEvent::Retry).await,
        KeyCode::Char('l') => fire(app, Target::ClearButton, EventKind::Click).await,
        _ => {}
    }
    Action::Continue
}

async fn handle_search_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char(c) => {
            if app.page().search_value().chars().count() >= MAX_SEARCH_TERM_LENGTH {
                tracing::debug!(max = MAX_SEARCH_TERM_LENGTH, "Search term at maximum length");
                return;
            }
            app.controller.page_mut().insert_char(c);
            fire(app, Target::SearchInput, EventKind::Input).await;
        }
        KeyCode::Backspace => {
            app.controller.page_mut().backspace();
            fire(app, Target::SearchInput, EventKind::Input).await;
        }
        _ => {}
    }
}

async fn handle_category_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Up | KeyCode::Char('k') => app.nav_up(),
        KeyCode::Down | KeyCode::Char('j') => app.nav_down(),
        KeyCode::Char(' ') => {
            if let Some(option) = app.cursor_category() {
                let target = Target::CategoryOption(option.id.clone());
                fire(app, target, EventKind::Change).await;
            }
        }
        _ => {}
    }
}

/// Press whichever "List" button is showing, falling back to Apply.
async fn press_list_button(app: &mut App) {
    for target in [
        Target::ListButtonExpanded,
        Target::ListButtonCollapsed,
        Target::ApplyButton,
    ] {
        if let Some(event) = app.controller.page_mut().dispatch(&target, EventKind::Click) {
            app.controller.handle_ui_event(event).await;
            return;
        }
    }
}

/// Fire `kind` on `target` and route the resulting event, if any.
async fn fire(app: &mut App, target: Target, kind: EventKind) {
    match app.controller.page_mut().dispatch(&target, kind) {
        Some(event) => app.controller.handle_ui_event(event).await,
        None => tracing::debug!(?target, ?kind, "No listener bound"),
    }
}
