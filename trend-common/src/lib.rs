//! # Trend Merge Common Library
//!
//! Shared code for the trend merge service including:
//! - Error type and result alias
//! - Configuration resolution (CLI → ENV → TOML → defaults)
//! - Timestamp parsing and formatting
//! - CSV table loading
//! - Naming helpers for exported artifacts

pub mod config;
pub mod error;
pub mod naming;
pub mod table;
pub mod time;

pub use error::{Error, Result};
pub use table::CsvTable;
