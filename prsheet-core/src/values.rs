//! Spreadsheet cell values

use std::fmt;

use serde::{Serialize, Serializer};

/// A single worksheet row
pub type Row = Vec<Cell>;

/// A value written into one spreadsheet cell
///
/// Serializes to the JSON shape the Sheets `values` API expects: `null` for
/// an empty cell, a string, or a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(i64),
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Number(n) => serializer.serialize_i64(*n),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::Number(value as i64)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Number(value as i64)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_row() {
        let row: Row = vec![
            Cell::from(42u64),
            Cell::from("title"),
            Cell::Empty,
            Cell::from(None::<String>),
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[42,"title",null,null]"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(Cell::from(7usize).to_string(), "7");
        assert_eq!(Cell::Empty.to_string(), "");
        assert_eq!(Cell::from("alice").to_string(), "alice");
    }
}
