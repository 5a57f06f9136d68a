use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use vcsgrip_core::domain::{
    CommandOutput, ExportData, ImportParams, LogParams, Operation, OperationKind, RepoKind,
    ReturnCode, ValidateParams,
};
use vcsgrip_core::ports::VcsClient;

use super::process::{
    create_path, has_marker_dir, join_outputs, remove_path, resolve_executable, CommandLine,
};

static EXECUTABLE: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Client for Subversion working copies
#[derive(Debug, Clone)]
pub struct SvnClient {
    path: PathBuf,
}

impl SvnClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn is_repository(path: &Path) -> bool {
        has_marker_dir(path, ".svn")
    }

    fn svn(&self) -> Result<CommandLine> {
        Ok(CommandLine::new(resolve_executable(&EXECUTABLE, "svn")?))
    }

    fn exec(&self, cmd: CommandLine) -> Result<CommandOutput> {
        cmd.run(&self.path)
    }

    /// `svn info` with a fixed locale so its fields can be parsed
    fn info(&self) -> Result<CommandOutput> {
        self.exec(self.svn()?.arg("info").env("LC_ALL", "C"))
    }

    /// Reduce `svn info` output to the value of one field
    fn info_field(&self, field: &str) -> Result<CommandOutput> {
        let info = self.info()?;
        if info.is_failure() {
            return Ok(info);
        }
        match info_value(&info.output, field) {
            Some(value) => {
                let value = value.to_string();
                Ok(info.with_output(value))
            }
            None => Ok(CommandOutput {
                code: ReturnCode::Failed(1),
                output: format!("Could not determine {field}"),
                ..info
            }),
        }
    }

    fn log(&self, params: &LogParams) -> Result<CommandOutput> {
        if params.limit_tag.is_some() {
            return Ok(self.not_applicable(
                OperationKind::Log,
                Some("option '--limit-tag' is not supported"),
            ));
        }
        if params.limit_untagged {
            return Ok(self.not_applicable(
                OperationKind::Log,
                Some("option '--limit-untagged' is not supported"),
            ));
        }
        let mut cmd = self.svn()?.arg("log");
        if params.limit != 0 {
            cmd = cmd.arg("--limit").arg(params.limit.to_string());
        }
        self.exec(cmd)
    }

    fn export(&self, exact: bool) -> Result<CommandOutput> {
        let info = self.info()?;
        if info.is_failure() {
            return Ok(info);
        }
        let Some(url) = info_value(&info.output, "URL").map(str::to_string) else {
            return Ok(info.with_output("Could not determine url"));
        };
        let version = if exact {
            info_value(&info.output, "Revision").map(str::to_string)
        } else {
            None
        };

        let text = join_outputs(&[&url, version.as_deref().unwrap_or_default()]);
        Ok(
            CommandOutput::new(info.cmd, Some(self.path.clone()), text, ReturnCode::Success)
                .with_export(ExportData { url, version }),
        )
    }

    fn import(&self, params: &ImportParams) -> Result<CommandOutput> {
        if let Some(missing) = params.missing_values(false) {
            return Ok(CommandOutput::failed(
                &self.path,
                format!("Repository data lacks the {missing} value"),
            ));
        }
        let url = params.url.as_deref().unwrap_or_default();

        let mut existing = Self::is_repository(&self.path);
        if existing {
            let current = self.info_field("URL")?;
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

        let revision: Vec<String> = params
            .version
            .iter()
            .filter(|_| !params.skip_existing || !existing)
            .flat_map(|v| ["-r".to_string(), v.clone()])
            .collect();

        if existing {
            return self
                .svn()?
                .arg("update")
                .args(revision)
                .run_with_retry(&self.path, params.retry);
        }

        let checkout = self
            .svn()?
            .arg("checkout")
            .args(revision)
            .args([url, "."])
            .run_with_retry(&self.path, params.retry)?;
        if checkout.is_failure() {
            let message = format!("Could not checkout repository '{url}': {}", checkout.output);
            return Ok(checkout.with_output(message));
        }
        Ok(checkout)
    }

    fn validate(&self, params: &ValidateParams) -> Result<CommandOutput> {
        let Some(url) = params.url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(CommandOutput::failed(&self.path, "Repository data lacks the 'url' value"));
        };
        let target = match &params.version {
            Some(version) => format!("{url}@{version}"),
            None => url.to_string(),
        };
        let result = self
            .svn()?
            .args(["info", "--non-interactive"])
            .arg(target.as_str())
            .run_with_retry(&self.path, params.retry)?;
        if result.is_failure() {
            let message = format!("Failed to contact svn repository '{target}': {}", result.output);
            return Ok(result.with_output(message));
        }
        Ok(result.with_output(format!("Found svn repository '{target}'")))
    }
}

/// Value of a `Field: value` line from `svn info`
fn info_value<'a>(info: &'a str, field: &str) -> Option<&'a str> {
    info.lines().find_map(|line| {
        line.strip_prefix(field)
            .and_then(|rest| rest.strip_prefix(": "))
            .map(str::trim)
    })
}

impl From<PathBuf> for SvnClient {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl VcsClient for SvnClient {
    fn kind(&self) -> RepoKind {
        RepoKind::Svn
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn supports(&self, operation: OperationKind) -> bool {
        operation != OperationKind::Push
    }

    fn run(&self, operation: &Operation) -> Result<CommandOutput> {
        match operation {
            Operation::Branch { .. } | Operation::Remotes => self.info_field("URL"),
            Operation::Custom { args } => self.exec(self.svn()?.args(args.iter().cloned())),
            Operation::Diff { context } => {
                let mut cmd = self.svn()?.arg("diff");
                if let Some(context) = context {
                    cmd = cmd.args(["-x".to_string(), format!("--unified={context}")]);
                }
                self.exec(cmd)
            }
            Operation::Export { exact, .. } => self.export(*exact),
            Operation::Import(params) => self.import(params),
            Operation::Log(params) => self.log(params),
            Operation::Pull => self.exec(self.svn()?.arg("update")),
            Operation::Push => Ok(self.not_implemented(OperationKind::Push)),
            Operation::Status { quiet } => {
                let mut cmd = self.svn()?.arg("status");
                if *quiet {
                    cmd = cmd.arg("--quiet");
                }
                self.exec(cmd)
            }
            Operation::Validate(params) => self.validate(params),
        }
    }
}
