// 🚀 Remote Publisher - stage, commit, push the published document
// Single-writer checkout assumed: no pull, rebase, or conflict handling.

use crate::error::{Result, SyncError};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{error, info};

// ============================================================================
// VCS CAPABILITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The staged tree matches HEAD
    NothingToCommit,
}

/// VcsPublisher - the three operations the pipeline needs from version control
pub trait VcsPublisher {
    fn stage(&mut self, path: &Path) -> Result<()>;
    fn commit(&mut self, message: &str) -> Result<CommitOutcome>;
    fn push(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteOutcome {
    Pushed,
    /// Commit reported nothing to commit; push skipped
    NoChanges,
    /// Local-only run
    Skipped,
    Failed { step: String, message: String },
}

impl RemoteOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RemoteOutcome::Failed { .. })
    }

    /// The failure as an error, for strict runs
    pub fn to_error(&self) -> Option<SyncError> {
        match self {
            RemoteOutcome::Failed { step, message } => Some(SyncError::RemotePublish {
                step: step.clone(),
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

/// Commit message for a publish at `now`
pub fn commit_message(now: DateTime<Local>) -> String {
    format!("Actualizar datos: {}", now.format("%Y-%m-%d %H:%M"))
}

/// Stage → commit → push. Never returns an error: failures come back as
/// `RemoteOutcome::Failed` and are logged here.
pub fn publish_remote(
    vcs: &mut dyn VcsPublisher,
    path: &Path,
    now: DateTime<Local>,
) -> RemoteOutcome {
    info!("Publishing {} to remote...", path.display());

    let outcome = match run_steps(vcs, path, now) {
        Ok(outcome) => outcome,
        Err(SyncError::RemotePublish { step, message }) => RemoteOutcome::Failed { step, message },
        Err(other) => RemoteOutcome::Failed {
            step: "publish".to_string(),
            message: other.to_string(),
        },
    };

    match &outcome {
        RemoteOutcome::Pushed => info!("Push succeeded"),
        RemoteOutcome::NoChanges => info!("No data changes - nothing to push"),
        RemoteOutcome::Failed { step, message } => error!("ERROR in {}: {}", step, message),
        RemoteOutcome::Skipped => {}
    }
    outcome
}

fn run_steps(
    vcs: &mut dyn VcsPublisher,
    path: &Path,
    now: DateTime<Local>,
) -> Result<RemoteOutcome> {
    vcs.stage(path)?;
    match vcs.commit(&commit_message(now))? {
        CommitOutcome::NothingToCommit => Ok(RemoteOutcome::NoChanges),
        CommitOutcome::Committed => {
            vcs.push()?;
            Ok(RemoteOutcome::Pushed)
        }
    }
}

// ============================================================================
// GIT COMMAND LINE
// ============================================================================

/// Drives the `git` binary found on PATH
pub struct GitCli {
    repo_dir: PathBuf,
    remote: String,
    branch: String,
}

impl GitCli {
    pub fn new(repo_dir: &Path, remote: &str, branch: &str) -> Self {
        GitCli {
            repo_dir: repo_dir.to_path_buf(),
            remote: remote.to_string(),
            branch: branch.to_string(),
        }
    }

    fn run(&self, step: &str, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            // Messages are matched below; keep them untranslated
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                let message = if e.kind() == std::io::ErrorKind::NotFound {
                    "git not found in PATH".to_string()
                } else {
                    format!("failed to run git: {}", e)
                };
                failure(step, message)
            })
    }

    /// Path as git should see it: relative to the repo when inside it
    fn repo_relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.repo_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

impl VcsPublisher for GitCli {
    fn stage(&mut self, path: &Path) -> Result<()> {
        let relative = self.repo_relative(path);
        let target = relative.to_string_lossy();
        let output = self.run("stage", &["add", "--", target.as_ref()])?;
        if !output.status.success() {
            return Err(failure("stage", stderr_of(&output)));
        }
        Ok(())
    }

    fn commit(&mut self, message: &str) -> Result<CommitOutcome> {
        let output = self.run("commit", &["commit", "-m", message])?;
        if output.status.success() {
            return Ok(CommitOutcome::Committed);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_nothing_to_commit(&stdout) || is_nothing_to_commit(&stderr) {
            return Ok(CommitOutcome::NothingToCommit);
        }
        Err(failure("commit", stderr_of(&output)))
    }

    fn push(&mut self) -> Result<()> {
        let output = self.run("push", &["push", self.remote.as_str(), self.branch.as_str()])?;
        if !output.status.success() {
            return Err(failure("push", stderr_of(&output)));
        }
        Ok(())
    }
}

pub fn is_nothing_to_commit(text: &str) -> bool {
    text.contains("nothing to commit") || text.contains("nothing added to commit")
}

fn failure(step: &str, message: String) -> SyncError {
    SyncError::RemotePublish {
        step: step.to_string(),
        message,
    }
}

fn stderr_of(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr
    }
}

// ============================================================================
// TESTS
// ============================================================================
