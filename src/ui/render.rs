//! Render functions for the TUI.

use crate::app::{App, Focus};
use crate::page::{MemoryPage, Page, Target};
use crate::util::truncate_to_width;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::loop_runner::SPINNER_FRAMES;
use super::status;

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 50;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Width of the category panel when open.
const PANEL_WIDTH: u16 = 30;

const SPINNER: [&str; SPINNER_FRAMES] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &App) {
    let area = f.area();
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_search_bar(f, app, rows[0]);

    if app.controller.filters_expanded() {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(PANEL_WIDTH), Constraint::Min(0)])
            .split(rows[1]);
        render_filter_panel(f, app, columns[0]);
        render_listing(f, app, columns[1]);
    } else {
        render_listing(f, app, rows[1]);
    }

    status::render(f, app, rows[2]);
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn shown<'a>(page: &'a MemoryPage, target: &Target) -> Option<&'a str> {
    if page.is_visible(target) {
        page.text(target)
    } else {
        None
    }
}

fn render_search_bar(f: &mut Frame, app: &App, area: Rect) {
    let page = app.page();
    let focused = app.focus == Focus::Search;

    let mut spans = vec![
        Span::styled("Search: ", Style::default().fg(Color::Gray)),
        Span::raw(page.search_value().to_string()),
    ];
    if focused {
        spans.push(Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)));
    }
    spans.push(Span::styled(
        format!("   Sort: {}", page.sort_value().label()),
        Style::default().fg(Color::Gray),
    ));
    if let Some(active) = shown(page, &Target::FilterBadge) {
        spans.push(Span::styled(
            format!("   Filters ({})", active),
            Style::default().fg(Color::Yellow),
        ));
    }
    if page.is_visible(&Target::ListButtonCollapsed) {
        spans.push(Span::styled(
            "   [Enter] List",
            Style::default().fg(Color::Green),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(focused))
        .title(format!(" shopfilter | {} ", app.storefront));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_filter_panel(f: &mut Frame, app: &App, area: Rect) {
    let page = app.page();
    let focused = app.focus == Focus::Categories;
    let inner_width = area.width.saturating_sub(2) as usize;

    let mut lines: Vec<Line> = page
        .options()
        .iter()
        .enumerate()
        .map(|(idx, option)| {
            let mark = if page.is_checked(&Target::CategoryOption(option.id.clone())) {
                "[x]"
            } else {
                "[ ]"
            };
            let text = format!("{} {}", mark, option.name);
            let text = truncate_to_width(&text, inner_width).into_owned();
            if focused && idx == app.category_cursor {
                Line::styled(text, Style::default().add_modifier(Modifier::REVERSED))
            } else {
                Line::raw(text)
            }
        })
        .collect();

    if lines.is_empty() {
        lines.push(Line::styled(
            "No categories configured",
            Style::default().fg(Color::DarkGray),
        ));
    }

    lines.push(Line::raw(""));
    if let Some(advisory) = shown(page, &Target::AdvisoryCount) {
        lines.push(Line::styled(
            format!("~ {}", advisory),
            Style::default().fg(Color::Gray),
        ));
    }
    if page.is_visible(&Target::ListButtonExpanded) {
        lines.push(Line::styled("[Enter] List", Style::default().fg(Color::Green)));
    }

    let title = match shown(page, &Target::CategoryBadge) {
        Some(selected) => format!(" Categories ({}) ", selected),
        None => " Categories ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(focused))
        .title(title);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_listing(f: &mut Frame, app: &App, area: Rect) {
    let page = app.page();
    let focused = app.focus == Focus::Listing;
    let inner_width = area.width.saturating_sub(2) as usize;
    let visible_rows = area.height.saturating_sub(2) as usize;

    let mut title = match shown(page, &Target::ItemCount) {
        Some(count) => format!(" {} ", count),
        None => " Results ".to_string(),
    };
    if page.is_loading() {
        title.push_str(SPINNER[app.spinner_frame % SPINNER_FRAMES]);
        title.push(' ');
    }

    let offset = app
        .listing_cursor
        .saturating_sub(visible_rows.saturating_sub(1));
    let lines: Vec<Line> = if app.listing.is_empty() && !page.is_loading() {
        vec![Line::styled("No results", Style::default().fg(Color::DarkGray))]
    } else {
        app.listing
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible_rows)
            .map(|(idx, item)| {
                let text = truncate_to_width(item, inner_width).into_owned();
                if focused && idx == app.listing_cursor {
                    Line::styled(text, Style::default().add_modifier(Modifier::REVERSED))
                } else {
                    Line::raw(text)
                }
            })
            .collect()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(focused))
        .title(title);
    f.render_widget(Paragraph::new(lines).block(block), area);
}
