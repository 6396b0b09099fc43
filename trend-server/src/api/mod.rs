//! HTTP API handlers for trend-server

pub mod buildinfo;
pub mod exports;
pub mod health;
pub mod process;
pub mod ui;

pub use buildinfo::get_build_info;
pub use exports::{export_routes, list_exports};
pub use health::health_routes;
pub use process::{process_routes, process_upload};
pub use ui::{serve_index, serve_theme_js, ui_routes};
