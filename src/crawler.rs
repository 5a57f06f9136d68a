use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use vcsgrip_core::domain::{RepoHandle, RepoKind};
use walkdir::WalkDir;

use crate::clients::detect_kind;

/// Find working copies below each of `paths`, in the given order
///
/// Directories are walked depth first with entries sorted by name. A real
/// directory is only descended into once per call, so symlink cycles and
/// overlapping roots terminate. A symlinked alias of an already visited
/// working copy is still reported so duplicates can be flagged later.
/// Unless `nested` is set the walk stops at each working copy it finds.
pub fn find_repositories<P: AsRef<Path>>(paths: &[P], nested: bool) -> Vec<RepoHandle> {
    let mut crawler = Crawler::new(nested);
    for path in paths {
        crawler.walk(path.as_ref());
    }
    crawler.repositories
}

struct Crawler {
    nested: bool,
    /// Absolute paths as spelled, symlinks not resolved
    seen: HashSet<PathBuf>,
    /// Canonical paths of directories already descended into
    visited: HashSet<PathBuf>,
    repositories: Vec<RepoHandle>,
}

impl Crawler {
    fn new(nested: bool) -> Self {
        Self {
            nested,
            seen: HashSet::new(),
            visited: HashSet::new(),
            repositories: Vec::new(),
        }
    }

    fn walk(&mut self, root: &Path) {
        let mut walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // unreadable directories and symlink loops count as empty
                    debug!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if entry.depth() > 0 && is_marker_dir(entry.file_name()) {
                walker.skip_current_dir();
                continue;
            }

            let path = entry.path();
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            if !self.seen.insert(absolute) {
                walker.skip_current_dir();
                continue;
            }
            let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            let first_visit = self.visited.insert(canonical);

            let kind = detect_kind(path);
            if let Some(kind) = kind {
                debug!("found {} repository at '{}'", kind, path.display());
                self.repositories.push(RepoHandle::new(path, kind));
            }
            if !first_visit || (kind.is_some() && !self.nested) {
                walker.skip_current_dir();
            }
        }
    }
}

fn is_marker_dir(name: &std::ffi::OsStr) -> bool {
    RepoKind::SUPPORTED
        .iter()
        .filter_map(RepoKind::marker)
        .any(|marker| name == marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn make_repo(base: &Path, rel: &str, marker: &str) -> Result<PathBuf> {
        let path = base.join(rel);
        fs::create_dir_all(path.join(marker))?;
        Ok(path)
    }

    #[test]
    fn test_empty_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        assert!(find_repositories(&[temp_dir.path()], false).is_empty());
        Ok(())
    }

    #[test]
    fn test_sorted_depth_first_order() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path();
        let d = make_repo(base, "d", ".hg")?;
        let a = make_repo(base, "a", ".git")?;
        let c = make_repo(base, "b/c", ".svn")?;

        let repos = find_repositories(&[base], false);
        assert_eq!(
            repos,
            vec![
                RepoHandle::new(a, RepoKind::Git),
                RepoHandle::new(c, RepoKind::Svn),
                RepoHandle::new(d, RepoKind::Hg),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_nested_flag() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path();
        let outer = make_repo(base, "outer", ".git")?;
        let inner = make_repo(base, "outer/vendor/inner", ".bzr")?;

        let flat = find_repositories(&[base], false);
        assert_eq!(flat, vec![RepoHandle::new(&outer, RepoKind::Git)]);

        let nested = find_repositories(&[base], true);
        assert_eq!(
            nested,
            vec![
                RepoHandle::new(&outer, RepoKind::Git),
                RepoHandle::new(&inner, RepoKind::Bzr),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_root_itself_is_repository() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path();
        fs::create_dir(base.join(".git"))?;
        make_repo(base, "sub", ".git")?;

        let repos = find_repositories(&[base], false);
        assert_eq!(repos, vec![RepoHandle::new(base, RepoKind::Git)]);
        Ok(())
    }

    #[test]
    fn test_overlapping_roots_report_once() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path();
        let a = make_repo(base, "a", ".git")?;

        let repos = find_repositories(&[base.to_path_buf(), a.clone()], false);
        assert_eq!(repos, vec![RepoHandle::new(a, RepoKind::Git)]);
        Ok(())
    }

    #[test]
    fn test_marker_dirs_are_not_searched() {
        assert!(is_marker_dir(std::ffi::OsStr::new(".git")));
        assert!(is_marker_dir(std::ffi::OsStr::new(".bzr")));
        assert!(!is_marker_dir(std::ffi::OsStr::new("src")));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_treated_as_empty() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new()?;
        let base = temp_dir.path();
        let locked = base.join("a_locked");
        make_repo(base, "a_locked/hidden", ".git")?;
        let after = make_repo(base, "b", ".git")?;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;

        // permissions do not apply to root
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
            return Ok(());
        }

        let repos = find_repositories(&[base], false);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
        assert_eq!(repos, vec![RepoHandle::new(after, RepoKind::Git)]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path();
        let a = make_repo(base, "tree/a", ".git")?;
        std::os::unix::fs::symlink(base.join("tree"), base.join("tree/loop"))?;

        let repos = find_repositories(&[base], false);
        assert_eq!(repos, vec![RepoHandle::new(a, RepoKind::Git)]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_alias_is_reported_not_descended() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path();
        let repo = make_repo(base, "repo", ".git")?;
        make_repo(base, "repo/inner", ".git")?;
        let link = base.join("repo_link");
        std::os::unix::fs::symlink(&repo, &link)?;

        let repos = find_repositories(&[base], true);
        assert_eq!(
            repos,
            vec![
                RepoHandle::new(&repo, RepoKind::Git),
                RepoHandle::new(repo.join("inner"), RepoKind::Git),
                RepoHandle::new(&link, RepoKind::Git),
            ]
        );
        Ok(())
    }
}
