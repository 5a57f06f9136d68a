use anyhow::Result;
use std::path::{Path, PathBuf};
use vcsgrip_core::domain::{
    CommandOutput, ImportParams, Operation, OperationKind, RepoKind, ReturnCode, ValidateParams,
};
use vcsgrip_core::ports::VcsClient;

use super::archive::{check_url, clear_directory, fetch, open_zip, unpack_zip};
use super::process::create_path;

/// Client for zip archives unpacked into a directory on import
#[derive(Debug, Clone)]
pub struct ZipClient {
    path: PathBuf,
}

impl ZipClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn is_repository(_path: &Path) -> bool {
        false
    }

    fn lacks_url(&self) -> CommandOutput {
        CommandOutput::failed(&self.path, "Repository data lacks the 'url' value")
    }

    fn import(&self, params: &ImportParams) -> Result<CommandOutput> {
        if params.missing_values(false).is_some() {
            return Ok(self.lacks_url());
        }
        let url = params.url.as_deref().unwrap_or_default();

        if self.path.exists() {
            clear_directory(&self.path)?;
        } else if let Some(failure) = create_path(&self.path) {
            return Ok(failure);
        }

        let data = match fetch(url, params.retry) {
            Ok(data) => data,
            Err(e) => {
                return Ok(CommandOutput::failed(
                    &self.path,
                    format!("Could not fetch zipfile from '{url}': {e:#}"),
                ));
            }
        };
        let unpacked = open_zip(data).and_then(|mut archive| {
            let version = params.version.as_deref().filter(|v| !v.is_empty());
            unpack_zip(&mut archive, version, &self.path)
        });
        if let Err(e) = unpacked {
            return Ok(CommandOutput::new(
                format!("ZipFile({url})"),
                Some(self.path.clone()),
                format!("Could not read zipfile from '{url}': {e:#}"),
                ReturnCode::Failed(1),
            ));
        }

        Ok(CommandOutput::new(
            "",
            Some(self.path.clone()),
            format!("Downloaded zipfile from '{url}' and unpacked it"),
            ReturnCode::Success,
        ))
    }

    fn validate(&self, params: &ValidateParams) -> Result<CommandOutput> {
        let Some(url) = params.url.as_deref().filter(|url| !url.is_empty()) else {
            return Ok(self.lacks_url());
        };
        Ok(match check_url(url, params.retry) {
            Ok(()) => CommandOutput::new(
                "http HEAD",
                Some(self.path.clone()),
                format!("Zip url '{url}' exists"),
                ReturnCode::Neutral,
            ),
            Err(e) => CommandOutput::failed(
                &self.path,
                format!("Failed to contact zip url '{url}': {e:#}"),
            ),
        })
    }
}

impl From<PathBuf> for ZipClient {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl VcsClient for ZipClient {
    fn kind(&self) -> RepoKind {
        RepoKind::Zip
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn supports(&self, operation: OperationKind) -> bool {
        matches!(operation, OperationKind::Import | OperationKind::Validate)
    }

    fn run(&self, operation: &Operation) -> Result<CommandOutput> {
        match operation {
            Operation::Import(params) => self.import(params),
            Operation::Validate(params) => self.validate(params),
            other => Ok(self.not_implemented(other.kind())),
        }
    }
}
