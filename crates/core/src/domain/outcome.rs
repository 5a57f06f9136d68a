use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::operation::OperationKind;
use super::repo::RepoHandle;

/// How a job ended
///
/// `Neutral` is used for results that carry information but did no work,
/// such as a duplicate path. It never counts as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnCode {
    Success,
    Neutral,
    NotApplicable,
    Failed(i32),
}

impl ReturnCode {
    /// Maps a process exit code, treating signal termination as failure
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => ReturnCode::Success,
            Some(code) => ReturnCode::Failed(code),
            None => ReturnCode::Failed(1),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReturnCode::Failed(_))
    }
}

/// Structured data collected by `export`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportData {
    pub url: String,
    pub version: Option<String>,
}

/// What a client operation reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Human readable command line, empty when nothing was executed
    pub cmd: String,
    pub cwd: Option<PathBuf>,
    /// Combined stdout and stderr
    pub output: String,
    pub code: ReturnCode,
    pub export: Option<ExportData>,
}

impl CommandOutput {
    pub fn new(
        cmd: impl Into<String>,
        cwd: Option<PathBuf>,
        output: impl Into<String>,
        code: ReturnCode,
    ) -> Self {
        Self {
            cmd: cmd.into(),
            cwd,
            output: output.into(),
            code,
            export: None,
        }
    }

    /// A failure that happened before any command could run
    pub fn failed(cwd: &Path, output: impl Into<String>) -> Self {
        Self::new("", Some(cwd.to_path_buf()), output, ReturnCode::Failed(1))
    }

    pub fn not_applicable(
        cmd: impl Into<String>,
        cwd: Option<PathBuf>,
        output: impl Into<String>,
    ) -> Self {
        Self::new(cmd, cwd, output, ReturnCode::NotApplicable)
    }

    pub fn with_export(mut self, export: ExportData) -> Self {
        self.export = Some(export);
        self
    }

    /// Replaces the output text, keeping everything else
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn is_failure(&self) -> bool {
        self.code.is_failure()
    }
}

/// Outcome of one executed job, tied back to its repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub repo: RepoHandle,
    /// `None` for jobs that never had an operation (unsupported type)
    pub operation: Option<OperationKind>,
    pub outcome: CommandOutput,
}

impl JobResult {
    pub fn path(&self) -> &Path {
        &self.repo.path
    }

    pub fn code(&self) -> ReturnCode {
        self.outcome.code
    }

    pub fn output(&self) -> &str {
        &self.outcome.output
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }
}

/// True if any result failed; soft-skips and neutral results do not count
pub fn any_failure(results: &[JobResult]) -> bool {
    results.iter().any(JobResult::is_failure)
}
