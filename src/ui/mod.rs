//! Terminal user interface.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input, translated into page events
//! - `render` - Search bar, filter panel and listing
//! - `status` - Status bar widget

mod input;
mod loop_runner;
mod render;
mod status;

pub use loop_runner::{run, Action};
