// 🚨 Error Taxonomy - every way a sync run can fail
// Fatal variants stop the pipeline (after scratch cleanup); RemotePublish is
// only fatal when the run asked for strict remote mode.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration could not be loaded or failed validation
    #[error("configuration error: {0}")]
    Config(String),

    /// Network failure, timeout, bad status, or an undersized payload
    #[error("download failed: {0}")]
    Transfer(String),

    /// No reader is available for the downloaded document format
    #[error("no spreadsheet reader available for {format:?} ({path})")]
    MissingCapability { format: String, path: PathBuf },

    /// The document was read but no row survived the equipment-id gate
    #[error("no valid records found in sheet {sheet:?} ({rows} rows read)")]
    EmptyResult { sheet: String, rows: usize },

    /// The spreadsheet could not be opened or decoded
    #[error("could not read spreadsheet {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// Writing the published document failed
    #[error("could not write {path}: {source}")]
    LocalPublish {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Staging, committing, or pushing failed
    #[error("remote publish failed during {step}: {message}")]
    RemotePublish { step: String, message: String },
}

impl SyncError {
    /// Process exit status for this failure.
    ///
    /// Every fatal class gets its own code so a scheduler can tell a
    /// network outage apart from an empty sheet.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Config(_) => 2,
            SyncError::Transfer(_) => 3,
            SyncError::MissingCapability { .. } => 4,
            SyncError::EmptyResult { .. } => 5,
            SyncError::LocalPublish { .. } => 6,
            SyncError::RemotePublish { .. } => 7,
            SyncError::Read { .. } => 8,
        }
    }

    /// Short machine-friendly label, used in server responses and logs
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "config",
            SyncError::Transfer(_) => "transfer",
            SyncError::MissingCapability { .. } => "missing_capability",
            SyncError::Read { .. } => "read",
            SyncError::EmptyResult { .. } => "empty_result",
            SyncError::LocalPublish { .. } => "local_publish",
            SyncError::RemotePublish { .. } => "remote_publish",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_for_abort_points() {
        let transfer = SyncError::Transfer("timeout".to_string());
        let empty = SyncError::EmptyResult {
            sheet: "bd".to_string(),
            rows: 1,
        };
        let capability = SyncError::MissingCapability {
            format: "xlsx".to_string(),
            path: PathBuf::from("/tmp/x.xlsx"),
        };

        assert_ne!(transfer.exit_code(), 0);
        assert_ne!(empty.exit_code(), 0);
        assert_ne!(transfer.exit_code(), empty.exit_code());
        assert_ne!(capability.exit_code(), transfer.exit_code());
        assert_ne!(capability.exit_code(), empty.exit_code());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = SyncError::RemotePublish {
            step: "push".to_string(),
            message: "rejected".to_string(),
        };
        assert_eq!(err.to_string(), "remote publish failed during push: rejected");
        assert_eq!(err.kind(), "remote_publish");
    }
}
