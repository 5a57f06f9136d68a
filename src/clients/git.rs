use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;
use vcsgrip_core::domain::{
    CommandOutput, ExportData, ImportParams, LogParams, Operation, OperationKind, RepoKind,
    ReturnCode, ValidateParams,
};
use vcsgrip_core::ports::VcsClient;

use super::process::{
    cached_flag, create_path, join_cmds, join_outputs, remove_path, resolve_executable,
    CommandLine,
};

static EXECUTABLE: OnceLock<Option<PathBuf>> = OnceLock::new();
static COLOR_IS_AUTO: OnceLock<bool> = OnceLock::new();

/// Client for git working copies
#[derive(Debug, Clone)]
pub struct GitClient {
    path: PathBuf,
}

impl GitClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A `.git` directory, or a `.git` file as used by worktrees and submodules
    pub fn is_repository(path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn git(&self) -> Result<CommandLine> {
        Ok(CommandLine::new(resolve_executable(&EXECUTABLE, "git")?))
    }

    fn exec(&self, cmd: CommandLine) -> Result<CommandOutput> {
        cmd.run(&self.path)
    }

    /// Force colored output when the user configured `color.ui=auto`
    ///
    /// Output is captured, so git would otherwise never color it.
    fn colorize(&self, cmd: CommandLine) -> Result<CommandLine> {
        let color_is_auto = cached_flag(&COLOR_IS_AUTO, || {
            let setting = self.exec(self.git()?.args(["config", "--get", "color.ui"]))?;
            Ok(setting.output == "auto")
        });
        Ok(if color_is_auto {
            cmd.prepend_args(["-c", "color.ui=always"])
        } else {
            cmd
        })
    }

    fn branch(&self, all: bool) -> Result<CommandOutput> {
        let mut cmd = self.git()?.arg("branch");
        if all {
            cmd = cmd.arg("--all");
        }
        self.exec(cmd)
    }

    fn diff(&self, context: Option<u32>) -> Result<CommandOutput> {
        let mut cmd = self.colorize(self.git()?.arg("diff"))?;
        if let Some(context) = context {
            cmd = cmd.arg(format!("--unified={context}"));
        }
        self.exec(cmd)
    }

    fn status(&self, quiet: bool) -> Result<CommandOutput> {
        let mut cmd = self.colorize(self.git()?.arg("status"))?;
        if quiet {
            cmd = cmd.arg("--untracked-files=no");
        }
        self.exec(cmd)
    }

    fn log(&self, params: &LogParams) -> Result<CommandOutput> {
        let mut cmd = self.git()?.arg("log");
        if let Some(tag) = &params.limit_tag {
            let check = self.exec(
                self.git()?
                    .args(["rev-parse", "--verify", "--quiet"])
                    .arg(format!("refs/tags/{tag}")),
            )?;
            if check.is_failure() {
                return Ok(CommandOutput::failed(
                    &self.path,
                    format!("Repository lacks the tag '{tag}'"),
                ));
            }
            cmd = cmd.arg(format!("{tag}.."));
        } else if params.limit_untagged {
            let tag = self.exec(self.git()?.args(["describe", "--abbrev=0", "--tags"]))?;
            if tag.is_failure() {
                return Ok(tag);
            }
            cmd = cmd.arg(format!("{}..", tag.output));
        } else if params.limit != 0 {
            cmd = cmd.arg(format!("-{}", params.limit));
        }
        self.exec(cmd)
    }

    fn remote_url(&self) -> Result<CommandOutput> {
        let remotes = self.exec(self.git()?.args(["remote", "show"]))?;
        if remotes.is_failure() {
            let message = format!("Could not determine remote: {}", remotes.output);
            return Ok(remotes.with_output(message));
        }
        let remote = remotes.output.lines().next().unwrap_or("origin").to_string();

        let url = self.exec(
            self.git()?
                .args(["config", "--get"])
                .arg(format!("remote.{remote}.url")),
        )?;
        if url.is_failure() {
            let message = format!("Could not determine remote url: {}", url.output);
            return Ok(url.with_output(message));
        }
        Ok(url)
    }

    fn export(&self, exact: bool, with_tags: bool) -> Result<CommandOutput> {
        let url = self.remote_url()?;
        if url.is_failure() {
            return Ok(url);
        }

        let head = self.exec(self.git()?.args(["rev-parse", "HEAD"]))?;
        if head.is_failure() {
            let message = format!("Could not determine ref: {}", head.output);
            return Ok(head.with_output(message));
        }
        let mut version = head.output.clone();
        let mut cmd = head.cmd.clone();

        if !exact {
            let branch = self.exec(self.git()?.args(["rev-parse", "--abbrev-ref", "HEAD"]))?;
            if branch.is_failure() {
                let message = format!("Could not determine abbrev-ref: {}", branch.output);
                return Ok(branch.with_output(message));
            }
            if branch.output != "HEAD" {
                version = branch.output.clone();
                cmd = branch.cmd;
            }
        } else if with_tags {
            let tags = self.exec(self.git()?.args(["tag", "--points-at", "HEAD"]))?;
            let tag = tags.output.lines().find(|l| !l.is_empty()).filter(|_| !tags.is_failure());
            if let Some(tag) = tag {
                version = tag.to_string();
                cmd = tags.cmd.clone();
            }
        }

        Ok(CommandOutput::new(
            join_cmds(&url.cmd, &cmd),
            Some(self.path.clone()),
            join_outputs(&[&url.output, &version]),
            ReturnCode::Success,
        )
        .with_export(ExportData {
            url: url.output,
            version: Some(version),
        }))
    }

    fn import(&self, params: &ImportParams) -> Result<CommandOutput> {
        if let Some(missing) = params.missing_values(true) {
            return Ok(CommandOutput::failed(
                &self.path,
                format!("Repository data lacks the {missing} value"),
            ));
        }
        let url = params.url.as_deref().unwrap_or_default();
        let version = params.version.as_deref().unwrap_or_default();

        let mut cmd = String::new();
        let mut output = String::new();

        let mut existing = Self::is_repository(&self.path);
        if existing {
            let current = self.remote_url()?;
            if current.is_failure() {
                return Ok(current);
            }
            if current.output != url {
                if params.skip_existing {
                    return Ok(CommandOutput::new(
                        "",
                        Some(self.path.clone()),
                        "Skipped existing directory containing a different repository",
                        ReturnCode::Neutral,
                    ));
                }
                if !params.force {
                    return Ok(CommandOutput::failed(
                        &self.path,
                        "Path already exists and contains a different repository",
                    ));
                }
                debug!("removing '{}' to replace it", self.path.display());
                remove_path(&self.path)?;
                existing = false;
            }
        }

        if let Some(failure) = create_path(&self.path) {
            return Ok(failure);
        }

        if existing {
            let fetch = self
                .git()?
                .args(["fetch", "--tags"])
                .run_with_retry(&self.path, params.retry)?;
            if fetch.is_failure() {
                return Ok(fetch);
            }
            if params.skip_existing {
                return Ok(fetch);
            }
            cmd = fetch.cmd;
            output = fetch.output;
        } else {
            let mut clone = self.git()?.arg("clone");
            if params.recursive {
                clone = clone.arg("--recursive");
            }
            if params.shallow {
                clone = clone.args(["--depth", "1", "--branch", version]);
            }
            let result = clone.args([url, "."]).run_with_retry(&self.path, params.retry)?;
            if result.is_failure() {
                let message = format!("Could not clone repository '{url}': {}", result.output);
                return Ok(result.with_output(message));
            }
            if params.shallow {
                return Ok(result);
            }
            cmd = join_cmds(&cmd, &result.cmd);
            output = join_outputs(&[&output, &result.output]);
        }

        let checkout = self.exec(self.git()?.args(["checkout", version]))?;
        if checkout.is_failure() {
            let message = format!("Could not checkout ref '{version}': {}", checkout.output);
            return Ok(checkout.with_output(message));
        }
        cmd = join_cmds(&cmd, &checkout.cmd);
        output = join_outputs(&[&output, &checkout.output]);

        if existing {
            let branch = self.exec(self.git()?.args(["rev-parse", "--abbrev-ref", "HEAD"]))?;
            if !branch.is_failure() && branch.output != "HEAD" {
                let pull = self
                    .git()?
                    .args(["pull", "--ff-only"])
                    .run_with_retry(&self.path, params.retry)?;
                if pull.is_failure() {
                    return Ok(pull);
                }
                cmd = join_cmds(&cmd, &pull.cmd);
                output = join_outputs(&[&output, &pull.output]);
            }
        }

        if params.recursive {
            let submodules = self
                .git()?
                .args(["submodule", "update", "--init", "--recursive"])
                .run_with_retry(&self.path, params.retry)?;
            if submodules.is_failure() {
                return Ok(submodules);
            }
            cmd = join_cmds(&cmd, &submodules.cmd);
            output = join_outputs(&[&output, &submodules.output]);
        }

        Ok(CommandOutput::new(cmd, Some(self.path.clone()), output, ReturnCode::Success))
    }

    fn validate(&self, params: &ValidateParams) -> Result<CommandOutput> {
        let Some(url) = params.url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(CommandOutput::failed(&self.path, "Repository data lacks the 'url' value"));
        };
        let refs = self
            .git()?
            .args(["ls-remote", url])
            .run_with_retry(&self.path, params.retry)?;
        if refs.is_failure() {
            let message = format!("Failed to contact remote repository '{url}': {}", refs.output);
            return Ok(refs.with_output(message));
        }

        let Some(version) = params.version.as_deref() else {
            return Ok(refs.with_output(format!("Found git repository '{url}'")));
        };
        if ls_remote_has_ref(&refs.output, version) {
            Ok(refs.with_output(format!("Found git repository '{url}' with ref '{version}'")))
        } else {
            let message = format!(
                "Found git repository '{url}' but unable to verify ref '{version}' exists"
            );
            Ok(CommandOutput::new(refs.cmd, refs.cwd, message, ReturnCode::Failed(1)))
        }
    }
}

/// Whether `git ls-remote` output lists a branch, tag or commit matching `version`
fn ls_remote_has_ref(listing: &str, version: &str) -> bool {
    listing.lines().any(|line| {
        let mut parts = line.split_whitespace();
        let (Some(hash), Some(name)) = (parts.next(), parts.next()) else {
            return false;
        };
        name == format!("refs/heads/{version}")
            || name == format!("refs/tags/{version}")
            || name == version
            || (version.len() >= 7 && hash.starts_with(version))
    })
}

impl From<PathBuf> for GitClient {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl VcsClient for GitClient {
    fn kind(&self) -> RepoKind {
        RepoKind::Git
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn supports(&self, _operation: OperationKind) -> bool {
        true
    }

    fn run(&self, operation: &Operation) -> Result<CommandOutput> {
        match operation {
            Operation::Branch { all } => self.branch(*all),
            Operation::Custom { args } => self.exec(self.git()?.args(args.iter().cloned())),
            Operation::Diff { context } => self.diff(*context),
            Operation::Export { exact, with_tags } => self.export(*exact, *with_tags),
            Operation::Import(params) => self.import(params),
            Operation::Log(params) => self.log(params),
            Operation::Pull => self.exec(self.git()?.arg("pull")),
            Operation::Push => self.exec(self.git()?.arg("push")),
            Operation::Remotes => self.exec(self.git()?.args(["remote", "-v"])),
            Operation::Status { quiet } => self.status(*quiet),
            Operation::Validate(params) => self.validate(params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_repository_accepts_dir_and_gitfile() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let plain = temp_dir.path().join("plain");
        let repo = temp_dir.path().join("repo");
        let worktree = temp_dir.path().join("worktree");
        fs::create_dir_all(&plain)?;
        fs::create_dir_all(repo.join(".git"))?;
        fs::create_dir_all(&worktree)?;
        fs::write(worktree.join(".git"), "gitdir: ../repo/.git/worktrees/wt\n")?;

        assert!(!GitClient::is_repository(&plain));
        assert!(GitClient::is_repository(&repo));
        assert!(GitClient::is_repository(&worktree));
        Ok(())
    }

    #[test]
    fn test_ls_remote_matching() {
        let listing = "\
3f786850e387550fdab836ed7e6dc881de23001b\tHEAD
3f786850e387550fdab836ed7e6dc881de23001b\trefs/heads/main
89e6c98d92887913cadf06b2adb97f26cde4849b\trefs/tags/v1.0";
        assert!(ls_remote_has_ref(listing, "main"));
        assert!(ls_remote_has_ref(listing, "v1.0"));
        assert!(ls_remote_has_ref(listing, "89e6c98d"));
        assert!(!ls_remote_has_ref(listing, "develop"));
        assert!(!ls_remote_has_ref(listing, "89e"));
    }

    #[test]
    fn test_import_without_url_fails_before_running_git() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let client = GitClient::new(temp_dir.path().join("missing"));
        let output = VcsClient::run(&client, &Operation::Import(ImportParams::default()))?;
        assert_eq!(output.code, ReturnCode::Failed(1));
        assert_eq!(output.output, "Repository data lacks the 'url' and 'version' value");
        assert!(!temp_dir.path().join("missing").exists());
        Ok(())
    }

    #[test]
    fn test_validate_without_url_fails() -> Result<()> {
        let client = GitClient::new("repo");
        let output = VcsClient::run(&client, &Operation::Validate(ValidateParams::default()))?;
        assert!(output.is_failure());
        assert_eq!(output.output, "Repository data lacks the 'url' value");
        Ok(())
    }
}
