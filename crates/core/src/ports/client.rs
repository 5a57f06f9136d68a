use crate::domain::{CommandOutput, Operation, OperationKind, RepoKind};
use anyhow::Result;
use std::path::Path;

/// Port implemented by every VCS client adapter
///
/// One client wraps one working copy. `supports` is the capability table
/// consulted before dispatch; `run` is only called for supported kinds and
/// runs synchronously, usually spawning the VCS executable.
pub trait VcsClient: Send + Sync {
    fn kind(&self) -> RepoKind;

    fn path(&self) -> &Path;

    /// Whether `run` handles the given operation at all
    fn supports(&self, operation: OperationKind) -> bool;

    /// Execute an operation against the working copy
    fn run(&self, operation: &Operation) -> Result<CommandOutput>;

    /// Result for an operation `supports` rejects
    fn not_implemented(&self, operation: OperationKind) -> CommandOutput {
        CommandOutput::not_applicable(
            invocation_label(self.kind(), operation),
            Some(self.path().to_path_buf()),
            format!("Command '{operation}' not implemented for client '{}'", self.kind()),
        )
    }

    /// Result for an operation that is supported in general but not with the given parameters
    fn not_applicable(&self, operation: OperationKind, reason: Option<&str>) -> CommandOutput {
        let suffix = reason.map(|r| format!(": {r}")).unwrap_or_default();
        CommandOutput::not_applicable(
            invocation_label(self.kind(), operation),
            Some(self.path().to_path_buf()),
            format!("Command '{operation}' not applicable for client '{}'{suffix}", self.kind()),
        )
    }
}

/// Short description of a client call used when no command line exists
pub fn invocation_label(kind: RepoKind, operation: OperationKind) -> String {
    format!("{kind}.{operation}({operation})")
}
