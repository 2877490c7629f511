//! Worksheet abstraction and header management

use async_trait::async_trait;
use prsheet_core::Row;
use tracing::{debug, info, warn};

use crate::Result;

/// Row-level access to one worksheet
#[async_trait]
pub trait Worksheet: Send + Sync {
    /// Worksheet title
    fn title(&self) -> &str;

    /// Displayed values of a 1-based row, without trailing blanks
    async fn row_values(&self, row: u32) -> Result<Vec<String>>;

    /// Append rows after the last non-empty row, parsing values as if typed
    async fn append_rows(&self, rows: &[Row]) -> Result<()>;

    /// Remove every value, keeping the worksheet itself
    async fn clear(&self) -> Result<()>;
}

/// Outcome of [`ensure_headers`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    /// The sheet was empty and the headers were written
    Written,
    /// Row 1 already holds exactly these headers
    Present,
    /// Row 1 holds something else and was left alone
    Customized,
}

/// Make sure row 1 carries headers without clobbering user edits
pub async fn ensure_headers<W>(worksheet: &W, headers: &[&str]) -> Result<HeaderStatus>
where
    W: Worksheet + ?Sized,
{
    let first_row = worksheet.row_values(1).await?;

    if first_row.is_empty() {
        let row: Row = headers.iter().map(|h| (*h).into()).collect();
        worksheet.append_rows(&[row]).await?;
        info!(title = worksheet.title(), "Wrote header row");
        return Ok(HeaderStatus::Written);
    }

    if first_row.iter().map(String::as_str).eq(headers.iter().copied()) {
        debug!(title = worksheet.title(), "Header row present");
        Ok(HeaderStatus::Present)
    } else {
        warn!(
            title = worksheet.title(),
            found = ?first_row,
            "Header row differs from expected, leaving it unchanged"
        );
        Ok(HeaderStatus::Customized)
    }
}

/// Quote a worksheet title for use in an A1 range
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// A1 range covering one whole row
pub fn row_range(title: &str, row: u32) -> String {
    format!("{}!{}:{}", quote_title(title), row, row)
}
