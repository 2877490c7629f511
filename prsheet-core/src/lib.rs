//! prsheet core - configuration and shared value types
//!
//! This crate holds what the GitHub and Sheets sides of a sync run agree on:
//! the run configuration, credential lookup, and the cell values written to
//! a worksheet.

pub mod config;
pub mod error;
pub mod secrets;
pub mod values;

pub use config::{CliOverrides, Config, GitHubConfig, Mode, SheetsConfig, SyncConfig, TrackBy};
pub use error::{Error, Result};
pub use secrets::{ServiceAccountSource, Secrets};
pub use values::{Cell, Row};
