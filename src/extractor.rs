// 🧮 Extractor - raw sheet rows → Records
// Fixed column map, non-failing coercions, one validity gate (equipment id).

use crate::cell::{cell_at, Cell};
use crate::config::ColumnMap;
use crate::error::{Result, SyncError};
use crate::reader::{RowSource, SheetRows};
use crate::record::Record;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// What happened to the rows of one sheet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    /// Rows read, header included
    pub rows_read: usize,
    pub short_rows: usize,
    pub missing_id: usize,
    /// Valid rows that ended before the last non-optional column
    pub partial_rows: usize,
    pub records: usize,
}

/// Result of one extraction
#[derive(Debug, Clone)]
pub struct Extraction {
    pub sheet: String,
    pub substituted: bool,
    pub records: Vec<Record>,
    pub stats: ExtractStats,
}

pub struct Extractor {
    columns: ColumnMap,
    sheet_name: String,
}

impl Extractor {
    pub fn new(columns: ColumnMap, sheet_name: &str) -> Self {
        Extractor {
            columns,
            sheet_name: sheet_name.to_string(),
        }
    }

    /// Open `path` through `source` and extract every valid record.
    ///
    /// Zero valid records is an error, not an empty publish.
    pub fn extract_file(&self, source: &dyn RowSource, path: &Path) -> Result<Extraction> {
        info!(
            "Parsing {} (sheet: {}, reader: {})",
            path.display(),
            self.sheet_name,
            source.name()
        );
        let sheet = source.open(path, &self.sheet_name)?;
        self.extract(sheet)
    }

    pub fn extract(&self, sheet: SheetRows) -> Result<Extraction> {
        if sheet.substituted {
            warn!(
                "Sheet \"{}\" not found, using \"{}\"",
                sheet.requested, sheet.sheet
            );
        }

        let mut stats = ExtractStats {
            rows_read: sheet.rows.len(),
            ..ExtractStats::default()
        };
        info!("{} rows read (header included)", stats.rows_read);

        let mut records = Vec::new();
        for (index, row) in sheet.rows.iter().enumerate().skip(1) {
            if row.len() < self.columns.required_span() {
                stats.short_rows += 1;
                debug!("row {}: {} cells, too short for equipment id", index + 1, row.len());
                continue;
            }
            match self.build_record(row) {
                Some(record) => {
                    if row.len() < self.columns.core_span() {
                        stats.partial_rows += 1;
                        debug!("row {}: {} cells, missing columns defaulted", index + 1, row.len());
                    }
                    records.push(record);
                }
                None => stats.missing_id += 1,
            }
        }
        stats.records = records.len();

        info!(
            "{} valid records extracted ({} short rows, {} without equipment id, {} partial rows)",
            stats.records, stats.short_rows, stats.missing_id, stats.partial_rows
        );

        if records.is_empty() {
            return Err(SyncError::EmptyResult {
                sheet: sheet.sheet,
                rows: stats.rows_read,
            });
        }

        Ok(Extraction {
            sheet: sheet.sheet,
            substituted: sheet.substituted,
            records,
            stats,
        })
    }

    /// Map one row; `None` when the equipment id is blank
    pub fn build_record(&self, row: &[Cell]) -> Option<Record> {
        let c = &self.columns;

        let equipment_id = self.text(row, c.equipment_id);
        if equipment_id.is_empty() {
            return None;
        }

        Some(Record {
            equipment_id,
            equipment_type: self.text(row, c.equipment_type),
            brand: self.text(row, c.brand),
            model: self.text(row, c.model),
            repair_reason: self.text(row, c.repair_reason),
            part_cost: self.number(row, c.part_cost),
            labor_cost: self.number(row, c.labor_cost),
            other_cost: self.number(row, c.other_cost),
            total_cost: self.number(row, c.total_cost),
            actual_days: self.number(row, c.actual_days),
            delay_days: self.number(row, c.delay_days),
            node: self.text(row, c.node),
            region: self.text(row, c.region),
            classification: self.text(row, c.classification),
            service_type: self.text(row, c.service_type),
            standard_time: self.number(row, c.standard_time),
            family: self.text(row, c.family),
            month: self.text(row, c.month).to_lowercase(),
            year: self.text(row, c.year),
            maintenance_group: self.text(row, c.maintenance_group),
        })
    }

    // Both helpers default past the row end, which covers the optional
    // trailing columns and sheets narrower than the full layout
    fn text(&self, row: &[Cell], column: usize) -> String {
        cell_at(row, column).to_text()
    }

    fn number(&self, row: &[Cell], column: usize) -> f64 {
        cell_at(row, column).to_number()
    }
}

// ============================================================================
// TESTS
// ============================================================================
