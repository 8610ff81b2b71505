// Fleet Sync - Core Library
// Exposes all modules for use in CLI, trigger server, and tests

pub mod error;
pub mod config;
pub mod cell;
pub mod record;
pub mod reader;     // Spreadsheet readers (calamine, csv, in-memory)
pub mod extractor;  // Row → Record mapping
pub mod fetcher;    // Download into the scratch file
pub mod publisher;  // Local JSON document
pub mod git;        // Remote publish through git
pub mod pipeline;   // Fetch → Extract → Publish → Cleanup
pub mod logging;

// Re-export commonly used types
pub use error::{Result, SyncError};
pub use config::{ColumnMap, SyncConfig, DEFAULT_CONFIG_FILE};
pub use cell::{Cell, Row};
pub use record::{digest_records, PublishedDocument, Record};
pub use reader::{
    detect_format, get_row_source, resolve_sheet,
    CsvSource, MemorySource, RowSource, SheetRows, SourceFormat,
};
#[cfg(feature = "xlsx")]
pub use reader::WorkbookSource;
pub use extractor::{ExtractStats, Extraction, Extractor};
pub use fetcher::{transport_for, FetchReport, Fetcher, FileTransport, HttpTransport, Transport};
pub use publisher::{LocalOutcome, LocalPublisher, LocalReport};
pub use git::{
    commit_message, publish_remote,
    CommitOutcome, GitCli, RemoteOutcome, VcsPublisher,
};
pub use pipeline::{Pipeline, RunMode, RunReport};
pub use logging::LogFormat;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
