use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::CoreError;

/// Version control system a working copy belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Bzr,
    Git,
    Hg,
    Svn,
    /// Tarball downloaded on import, never a working copy
    Tar,
    /// Zip archive downloaded on import, never a working copy
    Zip,
    /// Placeholder for entries whose type has no client
    None,
}

impl RepoKind {
    /// Kinds with a client adapter, in marker probing order
    pub const SUPPORTED: [RepoKind; 6] = [
        RepoKind::Bzr,
        RepoKind::Git,
        RepoKind::Hg,
        RepoKind::Svn,
        RepoKind::Tar,
        RepoKind::Zip,
    ];

    /// Kinds that have working copies on disk
    pub const VERSION_CONTROLLED: [RepoKind; 4] =
        [RepoKind::Bzr, RepoKind::Git, RepoKind::Hg, RepoKind::Svn];

    pub fn name(&self) -> &'static str {
        match self {
            RepoKind::Bzr => "bzr",
            RepoKind::Git => "git",
            RepoKind::Hg => "hg",
            RepoKind::Svn => "svn",
            RepoKind::Tar => "tar",
            RepoKind::Zip => "zip",
            RepoKind::None => "none",
        }
    }

    /// Directory whose presence marks a working copy root
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            RepoKind::Bzr => Some(".bzr"),
            RepoKind::Git => Some(".git"),
            RepoKind::Hg => Some(".hg"),
            RepoKind::Svn => Some(".svn"),
            RepoKind::Tar | RepoKind::Zip | RepoKind::None => None,
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RepoKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RepoKind::SUPPORTED
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| CoreError::UnknownRepoKind { name: s.to_string() })
    }
}

/// A discovered (or to-be-imported) working copy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoHandle {
    pub path: PathBuf,
    pub kind: RepoKind,
}

impl RepoHandle {
    pub fn new(path: impl Into<PathBuf>, kind: RepoKind) -> Self {
        Self { path: path.into(), kind }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for RepoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.kind)
    }
}
