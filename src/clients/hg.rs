use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use vcsgrip_core::domain::{
    CommandOutput, ExportData, ImportParams, LogParams, Operation, OperationKind, RepoKind,
    ReturnCode, ValidateParams,
};
use vcsgrip_core::ports::VcsClient;

use super::process::{
    cached_flag, create_path, has_marker_dir, join_cmds, join_outputs, remove_path,
    resolve_executable, CommandLine,
};

static EXECUTABLE: OnceLock<Option<PathBuf>> = OnceLock::new();
static COLOR_ENABLED: OnceLock<bool> = OnceLock::new();

/// Client for Mercurial working copies
#[derive(Debug, Clone)]
pub struct HgClient {
    path: PathBuf,
}

impl HgClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn is_repository(path: &Path) -> bool {
        has_marker_dir(path, ".hg")
    }

    fn hg(&self) -> Result<CommandLine> {
        Ok(CommandLine::new(resolve_executable(&EXECUTABLE, "hg")?))
    }

    fn exec(&self, cmd: CommandLine) -> Result<CommandOutput> {
        cmd.run(&self.path)
    }

    /// Whether the color extension is available, enabled and not turned off
    fn color_enabled(&self) -> bool {
        cached_flag(&COLOR_ENABLED, || self.color_extension_enabled())
    }

    fn color_extension_enabled(&self) -> Result<bool> {
        if self.exec(self.hg()?.args(["config", "--help"]))?.is_failure() {
            return Ok(false);
        }
        let extension = self.exec(self.hg()?.args(["config", "extensions.color"]))?;
        if extension.is_failure() || extension.output.starts_with('!') {
            return Ok(false);
        }
        let mode = self.exec(self.hg()?.args(["config", "color.mode"]))?;
        Ok(!mode.is_failure() && mode.output != "off")
    }

    fn colorize(&self, cmd: CommandLine) -> Result<CommandLine> {
        Ok(if self.color_enabled() {
            cmd.prepend_args(["--color", "always"])
        } else {
            cmd
        })
    }

    fn log(&self, params: &LogParams) -> Result<CommandOutput> {
        let cmd = if let Some(tag) = &params.limit_tag {
            let check = self.exec(self.hg()?.args(["log", "--rev"]).arg(format!("tag({tag})")))?;
            if check.is_failure() {
                return Ok(CommandOutput::failed(
                    &self.path,
                    format!("Repository lacks the tag '{tag}'"),
                ));
            }
            self.hg()?
                .args(["log", "--rev"])
                .arg(format!("sort(tag({tag})::, -rev) and not tag({tag})"))
        } else if params.limit_untagged {
            let distance = self.exec(
                self.hg()?
                    .args(["log", "--rev", ".", "--template", "{latesttagdistance}"]),
            )?;
            if distance.is_failure() {
                return Ok(distance);
            }
            self.hg()?
                .args(["log", "--limit"])
                .arg(distance.output)
                .args(["-b", "."])
        } else {
            let cmd = self.hg()?.arg("log");
            if params.limit != 0 {
                cmd.arg("--limit").arg(params.limit.to_string())
            } else {
                cmd
            }
        };
        self.exec(self.colorize(cmd)?)
    }

    fn remote_url(&self) -> Result<CommandOutput> {
        let url = self.exec(self.hg()?.args(["paths", "default"]))?;
        if url.is_failure() {
            let message = format!("Could not determine url: {}", url.output);
            return Ok(url.with_output(message));
        }
        Ok(url)
    }

    fn export(&self, exact: bool) -> Result<CommandOutput> {
        let url = self.remote_url()?;
        if url.is_failure() {
            return Ok(url);
        }

        let id = self.exec(self.hg()?.args(["identify", "--id"]))?;
        if id.is_failure() {
            let message = format!("Could not determine id: {}", id.output);
            return Ok(id.with_output(message));
        }
        let mut version = id.output.clone();

        if !exact {
            let branch = self.exec(self.hg()?.args(["identify", "--branch"]))?;
            if branch.is_failure() {
                let message = format!("Could not determine branch: {}", branch.output);
                return Ok(branch.with_output(message));
            }
            let branch_id = self.exec(
                self.hg()?
                    .args(["identify", "-r"])
                    .arg(branch.output.as_str())
                    .arg("--id"),
            )?;
            if branch_id.is_failure() {
                let message = format!("Could not determine branch id: {}", branch_id.output);
                return Ok(branch_id.with_output(message));
            }
            if branch_id.output == version {
                version = branch.output;
            }
        }

        Ok(CommandOutput::new(
            join_cmds(&url.cmd, &id.cmd),
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
                remove_path(&self.path)?;
                existing = false;
            }
        }

        if let Some(failure) = create_path(&self.path) {
            return Ok(failure);
        }

        let fetched = if existing {
            let pull = self.hg()?.arg("pull").run_with_retry(&self.path, params.retry)?;
            if pull.is_failure() || params.skip_existing {
                return Ok(pull);
            }
            pull
        } else {
            let clone = self
                .hg()?
                .args(["clone", url, "."])
                .run_with_retry(&self.path, params.retry)?;
            if clone.is_failure() {
                let message = format!("Could not clone repository '{url}': {}", clone.output);
                return Ok(clone.with_output(message));
            }
            clone
        };

        let checkout = self.exec(self.hg()?.args(["checkout", version]))?;
        if checkout.is_failure() {
            let message = format!("Could not checkout '{version}': {}", checkout.output);
            return Ok(checkout.with_output(message));
        }

        Ok(CommandOutput::new(
            join_cmds(&fetched.cmd, &checkout.cmd),
            Some(self.path.clone()),
            join_outputs(&[&fetched.output, &checkout.output]),
            ReturnCode::Success,
        ))
    }

    fn validate(&self, params: &ValidateParams) -> Result<CommandOutput> {
        let Some(url) = params.url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(CommandOutput::failed(&self.path, "Repository data lacks the 'url' value"));
        };
        let mut cmd = self.hg()?.arg("identify");
        if let Some(version) = &params.version {
            cmd = cmd.args(["-r", version.as_str()]);
        }
        let result = cmd.arg(url).run_with_retry(&self.path, params.retry)?;
        if result.is_failure() {
            let message = match &params.version {
                Some(version) => format!(
                    "Failed to find revision '{version}' in hg repository '{url}': {}",
                    result.output
                ),
                None => format!("Failed to contact hg repository '{url}': {}", result.output),
            };
            return Ok(result.with_output(message));
        }
        Ok(result.with_output(format!("Found hg repository '{url}'")))
    }
}

impl From<PathBuf> for HgClient {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl VcsClient for HgClient {
    fn kind(&self) -> RepoKind {
        RepoKind::Hg
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn supports(&self, _operation: OperationKind) -> bool {
        true
    }

    fn run(&self, operation: &Operation) -> Result<CommandOutput> {
        match operation {
            Operation::Branch { all } => {
                let cmd = self.hg()?.arg(if *all { "branches" } else { "branch" });
                self.exec(self.colorize(cmd)?)
            }
            Operation::Custom { args } => self.exec(self.hg()?.args(args.iter().cloned())),
            Operation::Diff { context } => {
                let mut cmd = self.colorize(self.hg()?.arg("diff"))?;
                if let Some(context) = context {
                    cmd = cmd.arg("--unified").arg(context.to_string());
                }
                self.exec(cmd)
            }
            Operation::Export { exact, .. } => self.export(*exact),
            Operation::Import(params) => self.import(params),
            Operation::Log(params) => self.log(params),
            Operation::Pull => self.exec(self.colorize(self.hg()?.args(["pull", "--update"]))?),
            Operation::Push => self.exec(self.hg()?.arg("push")),
            Operation::Remotes => self.exec(self.hg()?.arg("paths")),
            Operation::Status { quiet } => {
                let mut cmd = self.colorize(self.hg()?.arg("status"))?;
                if *quiet {
                    cmd = cmd.arg("--quiet");
                }
                self.exec(cmd)
            }
            Operation::Validate(params) => self.validate(params),
        }
    }
}
