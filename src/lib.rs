//! Terminal storefront browser built around a debounced, race-safe filter
//! controller.

pub mod app;
pub mod config;
pub mod filter;
pub mod page;
pub mod storage;
pub mod transport;
pub mod ui;
pub mod util;
