use crate::app::{App, Focus};
use crate::page::{NotificationLevel, Target};
use crate::util::strip_control_chars;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

/// Render the status bar: the current notice, or key hints.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }
    let page = app.page();

    let (text, style): (Cow<'_, str>, Style) = match page.notification() {
        Some(notice) => {
            let style = match notice.level {
                NotificationLevel::Error => Style::default().bg(Color::Red).fg(Color::White),
                NotificationLevel::Info => Style::default().bg(Color::Blue).fg(Color::White),
            };
            // Server-supplied text must not drive the terminal
            let message = strip_control_chars(&notice.message);
            let text = if notice.retryable {
                Cow::Owned(format!("{}  [Ctrl+R] retry  [Esc] dismiss", message))
            } else {
                message
            };
            (text, style)
        }
        None => {
            let toggle = page.text(&Target::FilterToggle).unwrap_or("Show filters");
            let hints = match app.focus {
                Focus::Search => "Type to search",
                Focus::Categories => "[Space] toggle  [Ctrl+L] clear",
                Focus::Listing => "[j/k] move",
            };
            (
                Cow::Owned(format!(
                    "{}  [Tab] focus  [F2] sort  [Ctrl+F] {}  [Ctrl+C] quit",
                    hints, toggle
                )),
                Style::default().bg(Color::DarkGray).fg(Color::White),
            )
        }
    };

    f.render_widget(Paragraph::new(text).style(style), area);
}
