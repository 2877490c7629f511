//! prsheet Sheets - Google Sheets access for prsheet
//!
//! Authenticates as a Google service account and reads, appends and clears
//! worksheet values through the Sheets v4 REST API.

mod auth;
mod client;
mod error;
mod memory;
mod worksheet;

pub use auth::{AccessToken, ServiceAccountKey, SPREADSHEETS_SCOPE};
pub use client::{SheetHandle, SheetsClient, NEW_SHEET_COLS, NEW_SHEET_ROWS};
pub use error::{Error, Result};
pub use memory::MemoryWorksheet;
pub use worksheet::{ensure_headers, quote_title, row_range, HeaderStatus, Worksheet};
