use anyhow::Result;
use std::path::{Path, PathBuf};
use vcsgrip_core::domain::{
    CommandOutput, ImportParams, Operation, OperationKind, RepoKind, ReturnCode,
};
use vcsgrip_core::ports::VcsClient;

use super::archive::{clear_directory, fetch, unpack_tarball};
use super::process::create_path;

/// Client for tarballs unpacked into a directory on import
///
/// There is no working copy afterwards, so discovery never finds one and
/// every operation besides import is unsupported.
#[derive(Debug, Clone)]
pub struct TarClient {
    path: PathBuf,
}

impl TarClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn is_repository(_path: &Path) -> bool {
        false
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
                    format!("Could not fetch tarball from '{url}': {e:#}"),
                ));
            }
        };
        if let Err(e) = unpack_tarball(&data, version, &self.path) {
            return Ok(CommandOutput::failed(
                &self.path,
                format!("Failed to read tarball fetched from '{url}': {e:#}"),
            ));
        }

        Ok(CommandOutput::new(
            "",
            Some(self.path.clone()),
            format!("Downloaded tarball from '{url}' and unpacked it"),
            ReturnCode::Success,
        ))
    }
}

impl From<PathBuf> for TarClient {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl VcsClient for TarClient {
    fn kind(&self) -> RepoKind {
        RepoKind::Tar
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn supports(&self, operation: OperationKind) -> bool {
        operation == OperationKind::Import
    }

    fn run(&self, operation: &Operation) -> Result<CommandOutput> {
        match operation {
            Operation::Import(params) => self.import(params),
            other => Ok(self.not_implemented(other.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::archive::fixtures::{serve, tarball, Routes};
    use std::collections::VecDeque;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_import_unpacks_version_folder_after_retry() -> Result<()> {
        let data = tarball(&[("lib-1.0/README.md", "# lib"), ("lib-1.0/src/lib.rs", "")], true)?;
        let routes = Routes::from([(
            "/lib.tar.gz".to_string(),
            VecDeque::from([(503, Vec::new()), (200, data)]),
        )]);
        let (base, server) = serve(routes)?;
        let temp_dir = TempDir::new()?;
        let dest = temp_dir.path().join("vendor/lib");
        let url = format!("{base}/lib.tar.gz");
        let params = ImportParams {
            url: Some(url.clone()),
            version: Some("lib-1.0".to_string()),
            retry: 1,
            ..ImportParams::default()
        };

        let output = TarClient::new(&dest).run(&Operation::Import(params))?;
        assert_eq!(output.code, ReturnCode::Success);
        assert_eq!(output.output, format!("Downloaded tarball from '{url}' and unpacked it"));
        assert_eq!(fs::read_to_string(dest.join("README.md"))?, "# lib");
        assert!(dest.join("src/lib.rs").is_file());

        let requested = server.join().map_err(|_| anyhow::anyhow!("server thread panicked"))??;
        assert_eq!(requested, vec!["GET /lib.tar.gz", "GET /lib.tar.gz"]);
        Ok(())
    }

    #[test]
    fn test_import_rejects_unreadable_tarball() -> Result<()> {
        let routes = Routes::from([(
            "/broken.tar".to_string(),
            VecDeque::from([(200, b"definitely not a tarball".to_vec())]),
        )]);
        let (base, _server) = serve(routes)?;
        let temp_dir = TempDir::new()?;
        let url = format!("{base}/broken.tar");
        let params = ImportParams {
            url: Some(url.clone()),
            version: Some("v1".to_string()),
            ..ImportParams::default()
        };

        let output = TarClient::new(temp_dir.path()).run(&Operation::Import(params))?;
        assert_eq!(output.code, ReturnCode::Failed(1));
        let expected = format!("Failed to read tarball fetched from '{url}': ");
        assert!(output.output.starts_with(&expected), "{}", output.output);
        Ok(())
    }

    #[test]
    fn test_import_needs_url_and_version() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let client = TarClient::new(temp_dir.path().join("vendor"));
        let params = ImportParams {
            url: Some("https://example.com/lib.tar.gz".to_string()),
            ..ImportParams::default()
        };

        let output = client.run(&Operation::Import(params))?;
        assert_eq!(output.code, ReturnCode::Failed(1));
        assert_eq!(output.output, "Repository data lacks the 'version' value");
        assert!(!temp_dir.path().join("vendor").exists());
        Ok(())
    }

    #[test]
    fn test_unreachable_url_fails_after_clearing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let dest = temp_dir.path().join("vendor");
        fs::create_dir_all(dest.join("old"))?;
        let client = TarClient::new(&dest);
        let params = ImportParams {
            url: Some("http://127.0.0.1:9/lib.tar.gz".to_string()),
            version: Some("lib-1.0".to_string()),
            ..ImportParams::default()
        };

        let output = client.run(&Operation::Import(params))?;
        assert_eq!(output.code, ReturnCode::Failed(1));
        assert!(output
            .output
            .starts_with("Could not fetch tarball from 'http://127.0.0.1:9/lib.tar.gz': "));
        assert!(dest.is_dir());
        assert!(!dest.join("old").exists());
        Ok(())
    }

    #[test]
    fn test_only_import_is_supported() {
        let client = TarClient::new("vendor");
        assert!(!TarClient::is_repository(Path::new(".")));
        assert!(client.supports(OperationKind::Import));
        assert!(!client.supports(OperationKind::Status));

        let output = client.run(&Operation::Status { quiet: false });
        assert!(output.is_ok_and(|o| o == client.not_implemented(OperationKind::Status)));
    }
}
