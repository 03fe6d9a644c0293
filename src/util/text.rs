use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Terminal columns occupied by `s`.
///
/// CJK characters and most emoji take two columns, combining marks none.
///
/// ```
/// use shopfilter::util::display_width;
///
/// assert_eq!(display_width("Boots"), 5);
/// assert_eq!(display_width("靴"), 2);
/// ```
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Cut `s` so it fits in `max_width` columns, marking the cut with `...`.
///
/// Widths of three columns or fewer get a plain cut with no ellipsis. Input
/// that already fits is returned borrowed.
///
/// ```
/// use shopfilter::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Leather boots", 9), "Leathe...");
/// assert_eq!(truncate_to_width("Hat", 10), "Hat");
/// assert_eq!(truncate_to_width("Hat", 2), "Ha");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Owned(s[..prefix_fitting(s, max_width)].to_string());
    }
    let cut = prefix_fitting(s, max_width - ELLIPSIS_WIDTH);
    Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
}

/// Byte length of the longest prefix of `s` no wider than `width` columns.
fn prefix_fitting(s: &str, width: usize) -> usize {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > width {
            return idx;
        }
        used += w;
    }
    s.len()
}

fn is_stripped_control(c: char) -> bool {
    (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{7f}'
}

/// Remove control characters and ANSI escape sequences from server text.
///
/// CSI (`ESC [ ... final`) and OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`)
/// sequences are dropped whole. Tab, newline and carriage return survive.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            if !is_stripped_control(c) {
                out.push(c);
            }
            continue;
        }
        match chars.peek() {
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\u{07}' {
                        break;
                    }
                    if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    Cow::Owned(out)
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("tag pattern is valid"))
}

fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    // &amp; last so "&amp;lt;" stays "&lt;"
    Cow::Owned(
        s.replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&"),
    )
}

/// Visible text of a markup fragment on one line.
///
/// Tags and comments become spaces, common entities are decoded, runs of
/// whitespace collapse to one space and control characters are removed.
pub fn markup_text(fragment: &str) -> String {
    let without_tags = tag_regex().replace_all(fragment, " ");
    let decoded = decode_entities(&without_tags);
    let clean = strip_control_chars(&decoded);
    clean.split_whitespace().collect::<Vec<_>>().join(" ")
}
