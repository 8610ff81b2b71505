// 📚 Spreadsheet Readers - narrow seam between file formats and extraction
// `RowSource::open(path, sheet)` is the only thing the extractor depends on.

use crate::cell::{cell_from_field, Cell, Row};
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Document formats we know how to name (not necessarily read - see `get_row_source`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Xlsx,
    Xlsm,
    Xlsb,
    Xls,
    Ods,
    Csv,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<SourceFormat> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "xlsx" => Some(SourceFormat::Xlsx),
            "xlsm" => Some(SourceFormat::Xlsm),
            "xlsb" => Some(SourceFormat::Xlsb),
            "xls" => Some(SourceFormat::Xls),
            "ods" => Some(SourceFormat::Ods),
            "csv" => Some(SourceFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Xlsm => "xlsm",
            SourceFormat::Xlsb => "xlsb",
            SourceFormat::Xls => "xls",
            SourceFormat::Ods => "ods",
            SourceFormat::Csv => "csv",
        }
    }

    /// Formats that need the workbook reader (`xlsx` feature)
    pub fn is_workbook(&self) -> bool {
        !matches!(self, SourceFormat::Csv)
    }
}

/// Rows of the resolved sheet, header included
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRows {
    /// Sheet name that was asked for
    pub requested: String,

    /// Sheet name actually read
    pub sheet: String,

    /// True when `requested` was absent and the first sheet was used instead
    pub substituted: bool,

    pub rows: Vec<Row>,
}

/// RowSource - anything that can produce raw rows for a named sheet
pub trait RowSource {
    /// Open `path` and return every row of `sheet`, or of the first sheet
    /// when no sheet has that exact name
    fn open(&self, path: &Path, sheet: &str) -> Result<SheetRows>;

    /// Reader name for logs
    fn name(&self) -> &str;
}

/// Pick the sheet to read: exact match first, otherwise the first sheet
pub fn resolve_sheet(names: &[String], requested: &str) -> Option<(String, bool)> {
    if names.iter().any(|n| n == requested) {
        return Some((requested.to_string(), false));
    }
    names.first().map(|first| (first.clone(), true))
}

// ============================================================================
// FACTORY
// ============================================================================

/// Detect the document format from the file extension
pub fn detect_format(path: &Path) -> Option<SourceFormat> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(SourceFormat::from_extension)
}

/// Get a reader able to open `path`.
///
/// Fails with `MissingCapability` when the format is unknown or its reader
/// was not compiled in.
pub fn get_row_source(path: &Path) -> Result<Box<dyn RowSource>> {
    let missing = |format: String| SyncError::MissingCapability {
        format,
        path: path.to_path_buf(),
    };

    let format = detect_format(path).ok_or_else(|| {
        missing(
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("<none>")
                .to_string(),
        )
    })?;

    match format {
        SourceFormat::Csv => Ok(Box::new(CsvSource::new())),
        #[cfg(feature = "xlsx")]
        _ => Ok(Box::new(WorkbookSource::new())),
        #[cfg(not(feature = "xlsx"))]
        other => Err(missing(other.extension().to_string())),
    }
}

// ============================================================================
// WORKBOOK READER (calamine)
// ============================================================================

/// Reads xlsx/xlsm/xlsb/xls/ods through calamine, using the cached values
/// the spreadsheet application stored (formulas are not evaluated)
#[cfg(feature = "xlsx")]
pub struct WorkbookSource;

#[cfg(feature = "xlsx")]
impl WorkbookSource {
    pub fn new() -> Self {
        WorkbookSource
    }

    fn convert(value: &calamine::Data) -> Cell {
        use calamine::Data;

        match value {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(naive) => Cell::DateTime(naive),
                None => Cell::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Error(e.to_string()),
        }
    }
}

#[cfg(feature = "xlsx")]
impl Default for WorkbookSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "xlsx")]
impl RowSource for WorkbookSource {
    fn open(&self, path: &Path, sheet: &str) -> Result<SheetRows> {
        use calamine::{open_workbook_auto, Reader};

        let read_error = |message: String| SyncError::Read {
            path: path.to_path_buf(),
            message,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| read_error(e.to_string()))?;

        let names = workbook.sheet_names();
        let (resolved, substituted) = resolve_sheet(&names, sheet)
            .ok_or_else(|| read_error("workbook has no sheets".to_string()))?;

        let range = workbook
            .worksheet_range(&resolved)
            .map_err(|e| read_error(format!("sheet {:?}: {}", resolved, e)))?;

        // calamine trims leading empty rows/columns; put them back so column
        // indices and the header row match the sheet as the user sees it
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Row> = (0..start_row).map(|_| Vec::new()).collect();
        for raw in range.rows() {
            let mut row: Row = Vec::with_capacity(start_col as usize + raw.len());
            row.extend((0..start_col).map(|_| Cell::Empty));
            row.extend(raw.iter().map(Self::convert));
            rows.push(row);
        }

        Ok(SheetRows {
            requested: sheet.to_string(),
            sheet: resolved,
            substituted,
            rows,
        })
    }

    fn name(&self) -> &str {
        "workbook"
    }
}

// ============================================================================
// CSV READER
// ============================================================================

/// Reads a CSV export; the file is a single sheet named after its stem
pub struct CsvSource;

impl CsvSource {
    pub fn new() -> Self {
        CsvSource
    }
}

impl Default for CsvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RowSource for CsvSource {
    fn open(&self, path: &Path, sheet: &str) -> Result<SheetRows> {
        use csv::ReaderBuilder;

        let read_error = |message: String| SyncError::Read {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| read_error(e.to_string()))?;

        let mut rows = Vec::new();
        for (line, result) in reader.records().enumerate() {
            let record =
                result.map_err(|e| read_error(format!("line {}: {}", line + 1, e)))?;
            rows.push(record.iter().map(cell_from_field).collect());
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Sheet1")
            .to_string();
        let (resolved, substituted) = resolve_sheet(&[stem.clone()], sheet)
            .unwrap_or((stem, true));

        Ok(SheetRows {
            requested: sheet.to_string(),
            sheet: resolved,
            substituted,
            rows,
        })
    }

    fn name(&self) -> &str {
        "csv"
    }
}

// ============================================================================
// IN-MEMORY READER
// ============================================================================

/// Rows already held in memory, keyed by sheet name (order = workbook order).
/// Ignores the path it is given.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    sheets: Vec<(String, Vec<Row>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource { sheets: Vec::new() }
    }

    /// Builder pattern: append a sheet
    pub fn with_sheet(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.sheets.push((name.to_string(), rows));
        self
    }
}

impl RowSource for MemorySource {
    fn open(&self, path: &Path, sheet: &str) -> Result<SheetRows> {
        let names: Vec<String> = self.sheets.iter().map(|(n, _)| n.clone()).collect();
        let (resolved, substituted) =
            resolve_sheet(&names, sheet).ok_or_else(|| SyncError::Read {
                path: path.to_path_buf(),
                message: "workbook has no sheets".to_string(),
            })?;

        let rows = self
            .sheets
            .iter()
            .find(|(n, _)| *n == resolved)
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();

        Ok(SheetRows {
            requested: sheet.to_string(),
            sheet: resolved,
            substituted,
            rows,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// TESTS
// ============================================================================
