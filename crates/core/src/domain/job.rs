use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::operation::{Operation, OperationKind};
use super::repo::RepoHandle;
use crate::ports::VcsClient;

/// What a worker does with a job
pub enum JobAction {
    /// Invoke the operation on the client
    Run { client: Arc<dyn VcsClient>, operation: Operation },
    /// Another job already covers the same real path
    Duplicate { of: PathBuf, operation: OperationKind },
    /// No client exists for the requested type; report the message as a failure
    Unsupported { message: String },
}

impl fmt::Debug for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobAction::Run { client, operation } => f
                .debug_struct("Run")
                .field("client", &client.kind())
                .field("operation", operation)
                .finish(),
            JobAction::Duplicate { of, operation } => f
                .debug_struct("Duplicate")
                .field("of", of)
                .field("operation", operation)
                .finish(),
            JobAction::Unsupported { message } => {
                f.debug_struct("Unsupported").field("message", message).finish()
            }
        }
    }
}

/// One unit of scheduled work
#[derive(Debug)]
pub struct Job {
    pub repo: RepoHandle,
    pub action: JobAction,
    /// Repository paths whose jobs must finish before this one starts
    pub depends: BTreeSet<PathBuf>,
}

impl Job {
    pub fn new(client: Arc<dyn VcsClient>, operation: Operation) -> Self {
        let repo = RepoHandle::new(client.path(), client.kind());
        Self {
            repo,
            action: JobAction::Run { client, operation },
            depends: BTreeSet::new(),
        }
    }

    pub fn unsupported(repo: RepoHandle, message: impl Into<String>) -> Self {
        Self {
            repo,
            action: JobAction::Unsupported { message: message.into() },
            depends: BTreeSet::new(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.repo.path
    }

    pub fn operation_kind(&self) -> Option<OperationKind> {
        match &self.action {
            JobAction::Run { operation, .. } => Some(operation.kind()),
            JobAction::Duplicate { operation, .. } => Some(*operation),
            JobAction::Unsupported { .. } => None,
        }
    }

    pub fn operation(&self) -> Option<&Operation> {
        match &self.action {
            JobAction::Run { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Swap the handler for one that only points at `first`
    ///
    /// Jobs without an operation keep their action.
    pub fn mark_duplicate(&mut self, first: PathBuf) {
        if let Some(operation) = self.operation_kind() {
            self.action = JobAction::Duplicate { of: first, operation };
        }
    }

    pub fn is_ready(&self) -> bool {
        self.depends.is_empty()
    }
}
