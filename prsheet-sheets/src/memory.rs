//! In-memory worksheet
//!
//! Backs `prsheet sync --dry-run`, where rows are collected and printed
//! instead of sent to Google.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use prsheet_core::Row;

use crate::worksheet::Worksheet;
use crate::{Error, Result};

/// Worksheet held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryWorksheet {
    title: String,
    rows: Mutex<Vec<Row>>,
}

impl MemoryWorksheet {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_rows(title, Vec::new())
    }

    pub fn with_rows(title: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            title: title.into(),
            rows: Mutex::new(rows),
        }
    }

    /// Snapshot of the current contents
    pub fn rows(&self) -> Vec<Row> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, Vec<Row>>> {
        self.rows.lock().map_err(|_| {
            Error::Worksheet(format!("worksheet '{}' is poisoned by an earlier panic", self.title))
        })
    }

    /// Contents rendered as tab-separated lines
    pub fn to_tsv(&self) -> String {
        self.rows()
            .iter()
            .map(|row| {
                row.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Worksheet for MemoryWorksheet {
    fn title(&self) -> &str {
        &self.title
    }

    async fn row_values(&self, row: u32) -> Result<Vec<String>> {
        let rows = self.rows();
        let Some(values) = (row as usize).checked_sub(1).and_then(|i| rows.get(i)) else {
            return Ok(Vec::new());
        };

        let mut values: Vec<String> = values.iter().map(ToString::to_string).collect();
        while values.last().is_some_and(|v| v.is_empty()) {
            values.pop();
        }
        Ok(values)
    }

    async fn append_rows(&self, rows: &[Row]) -> Result<()> {
        self.lock_for_write()?.extend_from_slice(rows);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.lock_for_write()?.clear();
        Ok(())
    }
}
