use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a command, independent of its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Branch,
    Custom,
    Diff,
    Export,
    Import,
    Log,
    Pull,
    Push,
    Remotes,
    Status,
    Validate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 11] = [
        OperationKind::Branch,
        OperationKind::Custom,
        OperationKind::Diff,
        OperationKind::Export,
        OperationKind::Import,
        OperationKind::Log,
        OperationKind::Pull,
        OperationKind::Push,
        OperationKind::Remotes,
        OperationKind::Status,
        OperationKind::Validate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Branch => "branch",
            OperationKind::Custom => "custom",
            OperationKind::Diff => "diff",
            OperationKind::Export => "export",
            OperationKind::Import => "import",
            OperationKind::Log => "log",
            OperationKind::Pull => "pull",
            OperationKind::Push => "push",
            OperationKind::Remotes => "remotes",
            OperationKind::Status => "status",
            OperationKind::Validate => "validate",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogParams {
    /// Number of entries, 0 means unlimited
    pub limit: u32,
    /// Only show entries after this tag
    pub limit_tag: Option<String>,
    /// Only show entries after the nearest tag
    pub limit_untagged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportParams {
    pub url: Option<String>,
    pub version: Option<String>,
    /// Replace an existing checkout of a different repository
    pub force: bool,
    /// Leave existing checkouts untouched
    pub skip_existing: bool,
    pub recursive: bool,
    pub shallow: bool,
    /// Extra attempts for network operations
    pub retry: u32,
}

impl ImportParams {
    /// Names the required values that are missing, in the wording used in results
    pub fn missing_values(&self, require_version: bool) -> Option<&'static str> {
        let url_missing = self.url.as_deref().is_none_or(str::is_empty);
        let version_missing =
            require_version && self.version.as_deref().is_none_or(str::is_empty);
        match (url_missing, version_missing) {
            (true, true) => Some("'url' and 'version'"),
            (true, false) => Some("'url'"),
            (false, true) => Some("'version'"),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateParams {
    pub url: Option<String>,
    pub version: Option<String>,
    pub retry: u32,
}

/// A command together with the parameters adapters read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Branch { all: bool },
    Custom { args: Vec<String> },
    Diff { context: Option<u32> },
    Export { exact: bool, with_tags: bool },
    Import(ImportParams),
    Log(LogParams),
    Pull,
    Push,
    Remotes,
    Status { quiet: bool },
    Validate(ValidateParams),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Branch { .. } => OperationKind::Branch,
            Operation::Custom { .. } => OperationKind::Custom,
            Operation::Diff { .. } => OperationKind::Diff,
            Operation::Export { .. } => OperationKind::Export,
            Operation::Import(_) => OperationKind::Import,
            Operation::Log(_) => OperationKind::Log,
            Operation::Pull => OperationKind::Pull,
            Operation::Push => OperationKind::Push,
            Operation::Remotes => OperationKind::Remotes,
            Operation::Status { .. } => OperationKind::Status,
            Operation::Validate(_) => OperationKind::Validate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind() {
        assert_eq!(Operation::Pull.kind(), OperationKind::Pull);
        assert_eq!(Operation::Log(LogParams::default()).kind().name(), "log");
        assert_eq!(
            Operation::Import(ImportParams::default()).kind().to_string(),
            "import"
        );
    }

    #[test]
    fn test_missing_values() {
        let mut params = ImportParams::default();
        assert_eq!(params.missing_values(true), Some("'url' and 'version'"));
        assert_eq!(params.missing_values(false), Some("'url'"));

        params.url = Some("https://example.com/repo.git".to_string());
        assert_eq!(params.missing_values(true), Some("'version'"));
        assert_eq!(params.missing_values(false), None);

        params.version = Some(String::new());
        assert_eq!(params.missing_values(true), Some("'version'"));

        params.version = Some("main".to_string());
        assert_eq!(params.missing_values(true), None);
    }
}
