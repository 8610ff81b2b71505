// 🔁 Sync Pipeline - Fetch → Extract → Publish(local) → Publish(remote) → Cleanup
// Strictly sequential. The scratch file is removed on every exit path.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::extractor::{ExtractStats, Extractor};
use crate::fetcher::{FetchReport, Fetcher};
use crate::git::{publish_remote, GitCli, RemoteOutcome, VcsPublisher};
use crate::publisher::{LocalPublisher, LocalReport};
use crate::reader::{get_row_source, RowSource};
use crate::record::PublishedDocument;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Download, parse, write, and push
    Full,
    /// Download, parse, write; no version control
    LocalOnly,
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub records: usize,
    pub sheet: String,
    pub sheet_substituted: bool,
    pub stats: ExtractStats,
    pub fetch: FetchReport,
    pub local: LocalReport,
    pub remote: RemoteOutcome,
    pub output_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_url: Option<String>,
}

impl RunReport {
    /// Remote failure as an error, when the run is strict about it
    pub fn strict_failure(&self, strict_remote: bool) -> Option<SyncError> {
        if strict_remote {
            self.remote.to_error()
        } else {
            None
        }
    }

    pub fn log_summary(&self) {
        info!("COMPLETED");
        info!("  Records: {}", self.records);
        info!("  File:    {}", self.output_path.display());
        if let Some(url) = &self.publish_url {
            info!("  Site:    {}", url);
        }
        if self.remote.is_failure() {
            warn!("  Remote publish FAILED - the site was not updated");
        }
    }
}

// ============================================================================
// SCRATCH CLEANUP
// ============================================================================

/// Removes the scratch file when dropped
struct ScratchGuard {
    path: PathBuf,
}

impl ScratchGuard {
    fn new(path: &Path) -> Self {
        ScratchGuard {
            path: path.to_path_buf(),
        }
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    config: SyncConfig,
    mode: RunMode,
    fetcher: Fetcher,
    reader: Option<Box<dyn RowSource>>,
    vcs: Option<Box<dyn VcsPublisher>>,
}

impl Pipeline {
    /// Production wiring: transport by URL scheme, reader by file
    /// extension, git on PATH
    pub fn from_config(config: SyncConfig, mode: RunMode) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::from_config(&config)?;
        let vcs: Option<Box<dyn VcsPublisher>> = match mode {
            RunMode::Full => Some(Box::new(GitCli::new(
                &config.repo_dir,
                &config.remote,
                &config.branch,
            ))),
            RunMode::LocalOnly => None,
        };

        Ok(Pipeline {
            config,
            mode,
            fetcher,
            reader: None,
            vcs,
        })
    }

    /// Explicit wiring, used when the pieces are substituted
    pub fn new(config: SyncConfig, mode: RunMode, fetcher: Fetcher) -> Self {
        Pipeline {
            config,
            mode,
            fetcher,
            reader: None,
            vcs: None,
        }
    }

    /// Builder pattern: fixed reader instead of detection by extension
    pub fn with_reader(mut self, reader: Box<dyn RowSource>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Builder pattern: version control backend for full runs
    pub fn with_vcs(mut self, vcs: Box<dyn VcsPublisher>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn run(&mut self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started = Local::now();
        info!("Sync run {} starting ({:?})", run_id, self.mode);

        let scratch = self.config.scratch_file();
        let guard = ScratchGuard::new(&scratch);

        // 1. Fetch
        let fetch = self.fetcher.fetch(&self.config.source_url, &scratch)?;

        // 2. Extract
        let detected;
        let reader: &dyn RowSource = match &self.reader {
            Some(reader) => reader.as_ref(),
            None => {
                detected = get_row_source(&scratch)?;
                detected.as_ref()
            }
        };
        let extraction = Extractor::new(self.config.columns.clone(), &self.config.sheet_name)
            .extract_file(reader, &scratch)?;

        // 3. Publish locally
        let output = self.config.resolved_output();
        let records = extraction.records.len();
        let document = PublishedDocument::new(extraction.records);
        let local = LocalPublisher::new(&output)
            .rewrite_unchanged(self.config.rewrite_unchanged)
            .publish(&document)?;

        // 4. Publish remotely
        let remote = match (self.mode, self.vcs.as_mut()) {
            (RunMode::LocalOnly, _) => {
                info!("Local mode: not publishing (run without --local to push)");
                RemoteOutcome::Skipped
            }
            (RunMode::Full, Some(vcs)) => publish_remote(vcs.as_mut(), &output, Local::now()),
            (RunMode::Full, None) => RemoteOutcome::Failed {
                step: "publish".to_string(),
                message: "no version control backend configured".to_string(),
            },
        };

        // 5. Cleanup
        drop(guard);

        let publish_url = match self.mode {
            RunMode::Full => self.config.publish_url.clone(),
            RunMode::LocalOnly => None,
        };

        Ok(RunReport {
            run_id,
            mode: self.mode,
            started,
            finished: Local::now(),
            records,
            sheet: extraction.sheet,
            sheet_substituted: extraction.substituted,
            stats: extraction.stats,
            fetch,
            local,
            remote,
            output_path: output,
            publish_url,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::config::ColumnMap;
    use crate::fetcher::Transport;
    use crate::git::CommitOutcome;
    use crate::publisher::LocalOutcome;
    use crate::reader::MemorySource;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::{tempdir, TempDir};

    /// Serves the same payload on every call
    struct StaticTransport(Vec<u8>);

    impl Transport for StaticTransport {
        fn get(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn get(&self, _url: &str) -> Result<Vec<u8>> {
            Err(SyncError::Transfer("connection refused".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// In-memory stand-in for a git checkout: commits only when the staged
    /// file content differs from the last commit
    #[derive(Default)]
    struct RepoState {
        calls: Vec<String>,
        staged: Option<Vec<u8>>,
        committed: Option<Vec<u8>>,
        pushes: usize,
        fail_push: bool,
    }

    struct FakeRepo(Rc<RefCell<RepoState>>);

    impl VcsPublisher for FakeRepo {
        fn stage(&mut self, path: &Path) -> Result<()> {
            let mut state = self.0.borrow_mut();
            state.calls.push("stage".to_string());
            state.staged = std::fs::read(path).ok();
            Ok(())
        }

        fn commit(&mut self, _message: &str) -> Result<CommitOutcome> {
            let mut state = self.0.borrow_mut();
            state.calls.push("commit".to_string());
            if state.staged == state.committed {
                return Ok(CommitOutcome::NothingToCommit);
            }
            state.committed = state.staged.clone();
            Ok(CommitOutcome::Committed)
        }

        fn push(&mut self) -> Result<()> {
            let mut state = self.0.borrow_mut();
            state.calls.push("push".to_string());
            if state.fail_push {
                return Err(SyncError::RemotePublish {
                    step: "push".to_string(),
                    message: "remote rejected".to_string(),
                });
            }
            state.pushes += 1;
            Ok(())
        }
    }

    fn create_test_row(id: &str, total: f64) -> Vec<Cell> {
        let c = ColumnMap::default();
        let mut row = vec![Cell::Empty; 72];
        row[c.equipment_id] = if id.is_empty() { Cell::Empty } else { Cell::text(id) };
        row[c.total_cost] = Cell::Number(total);
        row[c.month] = Cell::text("Febrero");
        row
    }

    fn workbook(sheet: &str) -> MemorySource {
        MemorySource::new().with_sheet(
            sheet,
            vec![
                vec![Cell::text("header")],
                create_test_row("EQ-1", 100.0),
                create_test_row("", 50.0),
                create_test_row("EQ-3", 300.0),
            ],
        )
    }

    fn test_config(dir: &TempDir) -> SyncConfig {
        SyncConfig {
            source_url: "https://example.com/book.xlsx".to_string(),
            repo_dir: dir.path().to_path_buf(),
            publish_url: Some("https://example.github.io/dashboard/".to_string()),
            ..SyncConfig::default()
        }
    }

    fn pipeline(config: SyncConfig, mode: RunMode, payload_len: usize) -> Pipeline {
        let fetcher = Fetcher::new(
            Box::new(StaticTransport(vec![0u8; payload_len])),
            config.min_payload_bytes,
        );
        Pipeline::new(config, mode, fetcher).with_reader(Box::new(workbook("bd")))
    }

    fn fake_repo() -> (Box<dyn VcsPublisher>, Rc<RefCell<RepoState>>) {
        let state = Rc::new(RefCell::new(RepoState::default()));
        (Box::new(FakeRepo(Rc::clone(&state))), state)
    }

    #[test]
    fn test_full_run_writes_and_pushes() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        let (vcs, repo) = fake_repo();

        let report = pipeline(config.clone(), RunMode::Full, 5000)
            .with_vcs(vcs)
            .run()
            .unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(report.remote, RemoteOutcome::Pushed);
        assert_eq!(report.local.outcome, LocalOutcome::Written);
        assert_eq!(report.publish_url.as_deref(), Some("https://example.github.io/dashboard/"));
        assert_eq!(repo.borrow().calls, vec!["stage", "commit", "push"]);

        let doc: PublishedDocument =
            serde_json::from_slice(&std::fs::read(config.resolved_output()).unwrap()).unwrap();
        assert_eq!(doc.count, 2);
        assert_eq!(doc.data[0].equipment_id, "EQ-1");
        assert_eq!(doc.data[0].month, "febrero");
        assert_eq!(doc.data[1].total_cost, 300.0);
    }

    #[test]
    fn test_scratch_file_removed_after_success() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        let scratch = config.scratch_file();

        pipeline(config, RunMode::LocalOnly, 5000).run().unwrap();

        assert!(!scratch.exists());
    }

    #[test]
    fn test_local_only_never_touches_vcs() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        let (vcs, repo) = fake_repo();

        let report = pipeline(config.clone(), RunMode::LocalOnly, 5000)
            .with_vcs(vcs)
            .run()
            .unwrap();

        assert_eq!(report.remote, RemoteOutcome::Skipped);
        assert!(report.publish_url.is_none());
        assert!(repo.borrow().calls.is_empty());
        assert!(config.resolved_output().exists());
    }

    #[test]
    fn test_undersized_download_aborts_before_output_write() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        let (vcs, repo) = fake_repo();

        let result = pipeline(config.clone(), RunMode::Full, 999).with_vcs(vcs).run();

        assert!(matches!(result, Err(SyncError::Transfer(_))));
        assert!(!config.resolved_output().exists());
        assert!(!config.scratch_file().exists());
        assert!(repo.borrow().calls.is_empty());
    }

    #[test]
    fn test_transfer_failure_cleans_up() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        // Leftover from an interrupted run
        std::fs::write(config.scratch_file(), b"stale").unwrap();

        let fetcher = Fetcher::new(Box::new(FailingTransport), 1000);
        let result = Pipeline::new(config.clone(), RunMode::LocalOnly, fetcher)
            .with_reader(Box::new(workbook("bd")))
            .run();

        match result {
            Err(e) => assert_eq!(e.exit_code(), 3),
            Ok(_) => panic!("expected transfer failure"),
        }
        assert!(!config.scratch_file().exists());
    }

    #[test]
    fn test_empty_sheet_aborts_with_distinct_status() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        let reader = MemorySource::new().with_sheet(
            "bd",
            vec![vec![Cell::text("header")], create_test_row("", 1.0)],
        );
        let fetcher = Fetcher::new(Box::new(StaticTransport(vec![0u8; 5000])), 1000);

        let result = Pipeline::new(config.clone(), RunMode::LocalOnly, fetcher)
            .with_reader(Box::new(reader))
            .run();

        match result {
            Err(e @ SyncError::EmptyResult { .. }) => assert_eq!(e.exit_code(), 5),
            _ => panic!("expected EmptyResult"),
        }
        assert!(!config.resolved_output().exists());
        assert!(!config.scratch_file().exists());
    }

    #[test]
    fn test_missing_sheet_uses_first_sheet() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        let fetcher = Fetcher::new(Box::new(StaticTransport(vec![0u8; 5000])), 1000);

        let report = Pipeline::new(config, RunMode::LocalOnly, fetcher)
            .with_reader(Box::new(workbook("Sheet1")))
            .run()
            .unwrap();

        assert_eq!(report.sheet, "Sheet1");
        assert!(report.sheet_substituted);
        assert_eq!(report.records, 2);
    }

    #[test]
    fn test_second_identical_run_reports_no_changes() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        let state = Rc::new(RefCell::new(RepoState::default()));

        let first = pipeline(config.clone(), RunMode::Full, 5000)
            .with_vcs(Box::new(FakeRepo(Rc::clone(&state))))
            .run()
            .unwrap();
        let second = pipeline(config, RunMode::Full, 5000)
            .with_vcs(Box::new(FakeRepo(Rc::clone(&state))))
            .run()
            .unwrap();

        assert_eq!(first.remote, RemoteOutcome::Pushed);
        assert_eq!(second.local.outcome, LocalOutcome::Unchanged);
        assert_eq!(second.remote, RemoteOutcome::NoChanges);
        assert!(second.strict_failure(true).is_none());
        assert_eq!(state.borrow().pushes, 1);
    }

    #[test]
    fn test_push_failure_is_soft_unless_strict() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        let (vcs, repo) = fake_repo();
        repo.borrow_mut().fail_push = true;

        let report = pipeline(config.clone(), RunMode::Full, 5000)
            .with_vcs(vcs)
            .run()
            .unwrap();

        assert!(report.remote.is_failure());
        assert!(report.strict_failure(false).is_none());
        assert_eq!(report.strict_failure(true).map(|e| e.exit_code()), Some(7));
        assert!(config.resolved_output().exists());
        assert!(!config.scratch_file().exists());
    }

    #[test]
    fn test_reader_detected_from_scratch_extension() {
        let dir = tempdir().unwrap();
        let mut config = test_config(&dir);
        config.source_format = "csv".to_string();
        config.columns = ColumnMap {
            equipment_id: 0,
            total_cost: 1,
            ..ColumnMap::default()
        };

        let mut csv = String::from("equipo,total\n");
        for i in 0..100 {
            csv.push_str(&format!("EQ-{},{}.5\n", i, i));
        }
        let fetcher = Fetcher::new(Box::new(StaticTransport(csv.into_bytes())), 1000);

        let report = Pipeline::new(config, RunMode::LocalOnly, fetcher).run().unwrap();

        assert_eq!(report.records, 100);
        assert!(report.sheet_substituted);
    }
}
