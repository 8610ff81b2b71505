// 🔢 Cell Values - what a spreadsheet reader hands to the extractor
// Readers translate their native value types into `Cell`; the extractor only
// ever sees these and the two coercions below, which never fail.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One already-computed cell value (formulas are never evaluated here)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    /// Spreadsheet error code such as `#N/A` or `#DIV/0!`
    Error(String),
}

/// One spreadsheet row as read, no padding applied
pub type Row = Vec<Cell>;

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Numeric coercion: absent, blank, or non-numeric values become 0
    pub fn to_number(&self) -> f64 {
        let value = match self {
            Cell::Number(n) => *n,
            Cell::Bool(true) => 1.0,
            Cell::Bool(false) => 0.0,
            Cell::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            Cell::Empty | Cell::DateTime(_) | Cell::Error(_) => 0.0,
        };

        // NaN/inf have no JSON representation
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    /// Text coercion: empty cells become "", everything else its trimmed display form
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            other => other.to_string().trim().to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) => {
                // Whole numbers (ids, years) print without ".0"
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Cell::Error(code) => write!(f, "{}", code),
        }
    }
}

/// Borrow a cell by column, treating anything past the row end as empty
pub fn cell_at(row: &[Cell], column: usize) -> &Cell {
    static EMPTY: Cell = Cell::Empty;
    row.get(column).unwrap_or(&EMPTY)
}

/// Interpret a raw CSV field: blank → Empty, anything else Text.
///
/// CSV carries no types; numeric columns are parsed later by `to_number`,
/// text columns keep their exact spelling (`0012` stays `0012`).
pub fn cell_from_field(field: &str) -> Cell {
    if field.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(field.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
