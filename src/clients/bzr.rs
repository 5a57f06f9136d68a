use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use vcsgrip_core::domain::{
    CommandOutput, ImportParams, LogParams, Operation, OperationKind, RepoKind, ReturnCode,
};
use vcsgrip_core::ports::VcsClient;

use super::process::{create_path, has_marker_dir, remove_path, resolve_executable, CommandLine};

static EXECUTABLE: OnceLock<Option<PathBuf>> = OnceLock::new();

const PARENT_BRANCH_PREFIX: &str = "  parent branch: ";

/// Client for Bazaar branches
#[derive(Debug, Clone)]
pub struct BzrClient {
    path: PathBuf,
}

impl BzrClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn is_repository(path: &Path) -> bool {
        has_marker_dir(path, ".bzr")
    }

    fn bzr(&self) -> Result<CommandLine> {
        Ok(CommandLine::new(resolve_executable(&EXECUTABLE, "bzr")?))
    }

    fn exec(&self, cmd: CommandLine) -> Result<CommandOutput> {
        cmd.run(&self.path)
    }

    fn parent_branch(&self) -> Result<CommandOutput> {
        // parsing the text output requires enforcing language
        let info = self.exec(self.bzr()?.arg("info").env("LANG", "en_US.UTF-8"))?;
        if info.is_failure() {
            return Ok(info);
        }
        let branch = info
            .output
            .lines()
            .find_map(|line| line.strip_prefix(PARENT_BRANCH_PREFIX))
            .map(str::to_string);
        Ok(match branch {
            Some(branch) => info.with_output(branch),
            None => CommandOutput {
                code: ReturnCode::Failed(1),
                output: "Could not determine parent branch".to_string(),
                ..info
            },
        })
    }

    fn log(&self, params: &LogParams) -> Result<CommandOutput> {
        if params.limit_tag.is_none() && !params.limit_untagged {
            let mut cmd = self.bzr()?.arg("log");
            if params.limit != 0 {
                cmd = cmd.arg("--limit").arg(params.limit.to_string());
            }
            return self.exec(cmd);
        }

        let tag = match &params.limit_tag {
            Some(tag) => tag.clone(),
            None => {
                let tags = self.exec(self.bzr()?.args(["tags", "--sort=time"]))?;
                if tags.is_failure() {
                    return Ok(tags);
                }
                match latest_tag(&tags.output) {
                    Some(tag) => tag,
                    None => {
                        return Ok(CommandOutput {
                            code: ReturnCode::Failed(1),
                            output: "Could not determine latest tag".to_string(),
                            ..tags
                        });
                    }
                }
            }
        };

        let tag_rev = self.exec(self.bzr()?.args(["revno", "--rev"]).arg(format!("tag:{tag}")))?;
        if tag_rev.is_failure() {
            if params.limit_tag.is_some() {
                return Ok(tag_rev.with_output(format!("Repository lacks the tag '{tag}'")));
            }
            return Ok(tag_rev);
        }
        let head_rev = self.exec(self.bzr()?.arg("revno"))?;
        if head_rev.is_failure() {
            return Ok(head_rev);
        }

        let next_rev = match tag_rev.output.parse::<u64>() {
            Ok(rev) => (rev + 1).to_string(),
            Err(_) => tag_rev.output.clone(),
        };
        let mut cmd = self.bzr()?.args(["log", "--rev"]).arg(format!("revno:{next_rev}.."));
        if tag_rev.output == head_rev.output {
            return Ok(CommandOutput::new(
                cmd.display(),
                Some(self.path.clone()),
                "",
                ReturnCode::Success,
            ));
        }
        if params.limit != 0 {
            cmd = cmd.arg("--limit").arg(params.limit.to_string());
        }
        self.exec(cmd)
    }

    fn import(&self, params: &ImportParams) -> Result<CommandOutput> {
        if let Some(missing) = params.missing_values(false) {
            return Ok(CommandOutput::failed(
                &self.path,
                format!("Repository data lacks the {missing} value"),
            ));
        }
        let url = params.url.as_deref().unwrap_or_default();

        if Self::is_repository(&self.path) {
            let parent = self.parent_branch()?;
            if parent.is_failure() {
                return Ok(parent);
            }
            if parent.output != url {
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
                remove_path(&self.path)?;
            }
        }

        if let Some(failure) = create_path(&self.path) {
            return Ok(failure);
        }

        if Self::is_repository(&self.path) {
            return self.bzr()?.arg("pull").run_with_retry(&self.path, params.retry);
        }

        let mut cmd = self.bzr()?.arg("branch");
        if let Some(version) = &params.version {
            cmd = cmd.args(["-r", version.as_str()]);
        }
        let result = cmd.args([url, "."]).run_with_retry(&self.path, params.retry)?;
        if result.is_failure() {
            let message = format!("Could not branch repository '{url}': {}", result.output);
            return Ok(result.with_output(message));
        }
        Ok(result)
    }
}

/// Most recent tag that points at a revision in this branch
fn latest_tag(tags: &str) -> Option<String> {
    tags.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(tag), Some(rev)) if rev != "?" => Some(tag.to_string()),
                _ => None,
            }
        })
        .last()
}

impl From<PathBuf> for BzrClient {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl VcsClient for BzrClient {
    fn kind(&self) -> RepoKind {
        RepoKind::Bzr
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn supports(&self, operation: OperationKind) -> bool {
        !matches!(operation, OperationKind::Export | OperationKind::Validate)
    }

    fn run(&self, operation: &Operation) -> Result<CommandOutput> {
        match operation {
            Operation::Branch { all: true } => Ok(self.not_applicable(
                OperationKind::Branch,
                Some("at least with the option to list all branches"),
            )),
            Operation::Branch { all: false } | Operation::Remotes => self.parent_branch(),
            Operation::Custom { args } => self.exec(self.bzr()?.args(args.iter().cloned())),
            Operation::Diff { .. } => self.exec(self.bzr()?.arg("diff")),
            Operation::Import(params) => self.import(params),
            Operation::Log(params) => self.log(params),
            Operation::Pull => self.exec(self.bzr()?.arg("pull")),
            Operation::Push => self.exec(self.bzr()?.arg("push")),
            Operation::Status { .. } => self.exec(self.bzr()?.arg("status")),
            Operation::Export { .. } | Operation::Validate(_) => {
                Ok(self.not_implemented(operation.kind()))
            }
        }
    }
}
