// ⚙️ Sync Configuration - everything the pipeline used to hard-code
// Loaded from TOML (optional), then environment, then CLI overrides.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "fleet-sync.toml";

pub const ENV_SOURCE_URL: &str = "FLEET_SYNC_SOURCE_URL";
pub const ENV_OUTPUT: &str = "FLEET_SYNC_OUTPUT";
pub const ENV_REPO_DIR: &str = "FLEET_SYNC_REPO_DIR";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// ============================================================================
// COLUMN MAP
// ============================================================================

/// Zero-based spreadsheet column for every record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub equipment_id: usize,
    pub maintenance_group: usize,
    pub equipment_type: usize,
    pub brand: usize,
    pub model: usize,
    pub repair_reason: usize,
    pub part_cost: usize,
    pub labor_cost: usize,
    pub other_cost: usize,
    pub total_cost: usize,
    pub actual_days: usize,
    pub delay_days: usize,
    pub node: usize,
    pub region: usize,
    pub classification: usize,
    pub service_type: usize,
    pub standard_time: usize,
    pub family: usize,
    pub month: usize,
    pub year: usize,

    /// Columns at or past this index are optional trailing columns
    pub optional_from: usize,
}

impl Default for ColumnMap {
    fn default() -> Self {
        ColumnMap {
            equipment_id: 4,
            maintenance_group: 7,
            equipment_type: 8,
            brand: 10,
            model: 11,
            repair_reason: 13,
            part_cost: 32,
            labor_cost: 33,
            other_cost: 34,
            total_cost: 35,
            actual_days: 40,
            delay_days: 41,
            node: 45,
            region: 46,
            classification: 63,
            service_type: 64,
            standard_time: 68,
            family: 69,
            month: 70,
            year: 71,
            optional_from: 63,
        }
    }
}

impl ColumnMap {
    /// Minimum row length for the equipment id cell to exist
    pub fn required_span(&self) -> usize {
        self.equipment_id + 1
    }

    /// Whether a column is one of the optional trailing columns
    pub fn is_optional(&self, column: usize) -> bool {
        column >= self.optional_from
    }

    /// Row length needed to hold every non-optional column
    pub fn core_span(&self) -> usize {
        self.all()
            .into_iter()
            .filter(|c| !self.is_optional(*c))
            .max()
            .map_or(0, |c| c + 1)
    }

    fn all(&self) -> [usize; 20] {
        [
            self.equipment_id, self.maintenance_group, self.equipment_type, self.brand,
            self.model, self.repair_reason, self.part_cost, self.labor_cost,
            self.other_cost, self.total_cost, self.actual_days, self.delay_days,
            self.node, self.region, self.classification, self.service_type,
            self.standard_time, self.family, self.month, self.year,
        ]
    }
}

// ============================================================================
// SYNC CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Share link of the source spreadsheet (http(s)://, file://, or a path)
    pub source_url: String,

    /// Extension of the downloaded document, selects the reader
    pub source_format: String,

    /// Sheet holding the data; the first sheet is used when missing
    pub sheet_name: String,

    /// Published document, relative paths resolve against `repo_dir`
    pub output_path: PathBuf,

    /// Where the downloaded spreadsheet is parked during a run
    pub scratch_dir: PathBuf,

    /// Git working tree that hosts the published document
    pub repo_dir: PathBuf,

    pub remote: String,
    pub branch: String,

    /// Where the pushed document is served, for the final summary
    pub publish_url: Option<String>,

    pub user_agent: String,
    pub timeout_secs: u64,
    pub min_payload_bytes: usize,

    /// Extra download attempts after the first one
    pub retries: u32,
    pub retry_delay_secs: u64,

    /// Treat a failed remote publish as a failed run
    pub strict_remote: bool,

    /// Rewrite the document even when the data did not change
    pub rewrite_unchanged: bool,

    pub columns: ColumnMap,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            source_url: String::new(),
            source_format: "xlsx".to_string(),
            sheet_name: "bd".to_string(),
            output_path: PathBuf::from("data.json"),
            scratch_dir: PathBuf::from("."),
            repo_dir: PathBuf::from("."),
            remote: "origin".to_string(),
            branch: "master".to_string(),
            publish_url: None,
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_secs: 30,
            min_payload_bytes: 1000,
            retries: 0,
            retry_delay_secs: 5,
            strict_remote: false,
            rewrite_unchanged: false,
            columns: ColumnMap::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `fleet-sync.toml` in the
    /// working directory is used when present, defaults otherwise. Environment
    /// overrides are applied on top; validation is left to the caller so CLI
    /// flags can still fill in gaps.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    SyncConfig::default()
                }
            }
        };

        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncConfig::error(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| SyncConfig::error(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SyncConfig::error(e.to_string()))
    }

    /// Apply `FLEET_SYNC_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Some(url) = non_empty_env(ENV_SOURCE_URL) {
            self.source_url = url;
        }
        if let Some(output) = non_empty_env(ENV_OUTPUT) {
            self.output_path = PathBuf::from(output);
        }
        if let Some(repo) = non_empty_env(ENV_REPO_DIR) {
            self.repo_dir = PathBuf::from(repo);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            return Err(SyncConfig::error(format!(
                "source_url is empty (set it in {} or {})",
                DEFAULT_CONFIG_FILE, ENV_SOURCE_URL
            )));
        }
        if self.sheet_name.trim().is_empty() {
            return Err(SyncConfig::error("sheet_name is empty".to_string()));
        }
        if self.source_format.trim().is_empty() {
            return Err(SyncConfig::error("source_format is empty".to_string()));
        }
        if self.min_payload_bytes == 0 {
            return Err(SyncConfig::error(
                "min_payload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(SyncConfig::error(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Output document path with `repo_dir` applied
    pub fn resolved_output(&self) -> PathBuf {
        resolve(&self.repo_dir, &self.output_path)
    }

    /// Scratch file path for the downloaded spreadsheet
    pub fn scratch_file(&self) -> PathBuf {
        let name = format!("_temp_dashboard.{}", self.source_format.trim_start_matches('.'));
        resolve(&self.repo_dir, &self.scratch_dir).join(name)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    fn error(message: String) -> SyncError {
        SyncError::Config(message)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ============================================================================
// TESTS
// ============================================================================
