// 💾 Local Publisher - write the PublishedDocument to the output path
// Compact JSON, atomic replace, and a digest check so identical data leaves
// the file (and therefore the git tree) untouched.

use crate::error::{Result, SyncError};
use crate::record::{digest_records, PublishedDocument};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalOutcome {
    /// The document was (re)written
    Written,
    /// Existing file already held the same data; left as is
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalReport {
    pub path: PathBuf,
    pub outcome: LocalOutcome,
    /// Size of the file on disk after publishing
    pub bytes: u64,
    pub records: usize,
    /// SHA-256 of the data section
    pub digest: String,
}

pub struct LocalPublisher {
    path: PathBuf,
    rewrite_unchanged: bool,
}

impl LocalPublisher {
    pub fn new(path: &Path) -> Self {
        LocalPublisher {
            path: path.to_path_buf(),
            rewrite_unchanged: false,
        }
    }

    /// Builder pattern: always rewrite, even when the data is identical
    pub fn rewrite_unchanged(mut self, rewrite: bool) -> Self {
        self.rewrite_unchanged = rewrite;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn publish(&self, document: &PublishedDocument) -> Result<LocalReport> {
        let digest = document.data_digest();

        if !self.rewrite_unchanged && self.existing_digest().as_deref() == Some(digest.as_str()) {
            let bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
            info!(
                "Data unchanged, keeping {} ({} records)",
                self.path.display(),
                document.count
            );
            return Ok(LocalReport {
                path: self.path.clone(),
                outcome: LocalOutcome::Unchanged,
                bytes,
                records: document.count,
                digest,
            });
        }

        let payload = document.to_compact_json().map_err(|e| self.io_error(e.into()))?;
        self.write_atomic(&payload)?;

        let bytes = payload.len() as u64;
        info!(
            "Saved: {} ({:.0} KB, {} records)",
            self.path.display(),
            bytes as f64 / 1024.0,
            document.count
        );

        Ok(LocalReport {
            path: self.path.clone(),
            outcome: LocalOutcome::Written,
            bytes,
            records: document.count,
            digest,
        })
    }

    /// Digest of the data already published at the output path, if readable
    fn existing_digest(&self) -> Option<String> {
        let content = std::fs::read(&self.path).ok()?;
        match serde_json::from_slice::<PublishedDocument>(&content) {
            Ok(existing) => Some(digest_records(&existing.data)),
            Err(e) => {
                debug!("Existing {} not reusable: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Temp file in the target directory, then rename over the target
    fn write_atomic(&self, payload: &[u8]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| self.io_error(e))?;

        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| self.io_error(e))?;
        temp.write_all(payload).map_err(|e| self.io_error(e))?;
        temp.flush().map_err(|e| self.io_error(e))?;
        temp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> SyncError {
        SyncError::LocalPublish {
            path: self.path.clone(),
            source,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use chrono::{Local, TimeZone};
    use tempfile::tempdir;

    fn create_test_records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record {
                equipment_id: format!("EQ-{}", i),
                total_cost: 100.0 * i as f64 + 0.1,
                region: "Occidente".to_string(),
                ..Record::default()
            })
            .collect()
    }

    fn document_at(records: Vec<Record>, day: u32) -> PublishedDocument {
        PublishedDocument::at(records, Local.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap())
    }

    #[test]
    fn test_publish_writes_compact_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        let report = LocalPublisher::new(&path)
            .publish(&document_at(create_test_records(3), 1))
            .unwrap();

        assert_eq!(report.outcome, LocalOutcome::Written);
        assert_eq!(report.records, 3);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(report.bytes, content.len() as u64);
        assert!(!content.contains('\n'));

        let parsed: PublishedDocument = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.count, 3);
        assert_eq!(parsed.data.len(), 3);
    }

    #[test]
    fn test_publish_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("site").join("data").join("data.json");

        LocalPublisher::new(&path)
            .publish(&document_at(create_test_records(1), 1))
            .unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_identical_data_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let publisher = LocalPublisher::new(&path);

        publisher.publish(&document_at(create_test_records(2), 1)).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let report = publisher.publish(&document_at(create_test_records(2), 2)).unwrap();
        let after = std::fs::read_to_string(&path).unwrap();

        assert_eq!(report.outcome, LocalOutcome::Unchanged);
        assert_eq!(before, after);
        assert!(after.contains("2024-05-01T09:00:00"));
    }

    #[test]
    fn test_changed_data_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let publisher = LocalPublisher::new(&path);

        publisher.publish(&document_at(create_test_records(2), 1)).unwrap();
        let report = publisher.publish(&document_at(create_test_records(3), 2)).unwrap();

        assert_eq!(report.outcome, LocalOutcome::Written);
        let parsed: PublishedDocument =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed.count, 3);
        assert!(parsed.updated.starts_with("2024-05-02"));
    }

    #[test]
    fn test_rewrite_unchanged_forces_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let publisher = LocalPublisher::new(&path).rewrite_unchanged(true);

        publisher.publish(&document_at(create_test_records(2), 1)).unwrap();
        let report = publisher.publish(&document_at(create_test_records(2), 2)).unwrap();

        assert_eq!(report.outcome, LocalOutcome::Written);
        assert!(std::fs::read_to_string(&path).unwrap().contains("2024-05-02"));
    }

    #[test]
    fn test_corrupt_existing_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{not json").unwrap();

        let report = LocalPublisher::new(&path)
            .publish(&document_at(create_test_records(1), 1))
            .unwrap();

        assert_eq!(report.outcome, LocalOutcome::Written);
    }

    #[test]
    fn test_unwritable_target_is_local_publish_error() {
        let dir = tempdir().unwrap();
        // A directory where the file should go cannot be replaced by rename
        let path = dir.path().join("data.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let result = LocalPublisher::new(&path).publish(&document_at(create_test_records(1), 1));
        assert!(matches!(result, Err(SyncError::LocalPublish { .. })));
    }
}
