//! Text helpers for rendering server-provided markup in a terminal.
//!
//! ```
//! use shopfilter::util::{display_width, markup_text, truncate_to_width};
//!
//! let title = markup_text("<h3>Red &amp; Black Boots</h3>");
//! assert_eq!(title, "Red & Black Boots");
//! assert_eq!(display_width(&title), 17);
//! assert_eq!(truncate_to_width(&title, 10), "Red & B...");
//! ```

mod text;

pub use text::{display_width, markup_text, strip_control_chars, truncate_to_width};

/// Longest search term accepted from the keyboard.
pub const MAX_SEARCH_TERM_LENGTH: usize = 256;
