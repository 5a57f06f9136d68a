use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::cli::CommonArgs;
use crate::output::ColorChoice;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct Config {
    /// Number of parallel worker threads
    pub workers: usize,
    pub color: ColorChoice,
    /// Extra attempts for commands requiring network access
    pub retry: u32,
    /// Hide repositories with empty output
    pub hide_empty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            color: ColorChoice::Auto,
            retry: 2,
            hide_empty: false,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, usize::from)
}

pub fn get_default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "vcsgrip")
        .context("Failed to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    Ok(config_dir.join("vcsgrip.toml"))
}

impl Config {
    /// Load from `config_path` or the default location
    ///
    /// A missing default file yields the defaults; an explicitly named file must exist.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p,
            None => match get_default_config_path() {
                Ok(p) if p.exists() => p,
                _ => {
                    debug!("no config file, using defaults");
                    return Ok(Config::default());
                }
            },
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.workers == 0 {
            anyhow::bail!(
                "Invalid config file {}: workers must be greater than zero",
                path.display()
            );
        }
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_cli_and_file(cli_args: &CommonArgs) -> Result<Self> {
        let mut config = Self::load(cli_args.config.clone())?;

        // CLI args override config file
        if let Some(workers) = cli_args.workers {
            config.workers = workers;
        }
        if let Some(color) = cli_args.color {
            config.color = color;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.workers > 0);
        assert_eq!(config.color, ColorChoice::Auto);
        assert_eq!(config.retry, 2);
        assert!(!config.hide_empty);
    }

    #[test]
    fn test_config_load_all_keys() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test.toml");
        fs::write(
            &config_path,
            "workers = 3\ncolor = \"never\"\nretry = 0\nhide_empty = true\n",
        )?;

        let config = Config {
            workers: 3,
            color: ColorChoice::Never,
            retry: 0,
            hide_empty: true,
        };
        let loaded_config = Config::load(Some(config_path))?;

        assert_eq!(config, loaded_config);
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "color = \"always\"\n")?;

        let config = Config::load(Some(config_path))?;
        assert_eq!(config.color, ColorChoice::Always);
        assert_eq!(config.retry, 2);
        assert_eq!(config.workers, default_workers());
        Ok(())
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let result = Config::load(Some(temp_dir.path().join("nonexistent.toml")));
        assert!(result.is_err());
        assert!(!temp_dir.path().join("nonexistent.toml").exists());
        Ok(())
    }

    #[test]
    fn test_zero_workers_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("zero.toml");
        fs::write(&config_path, "workers = 0\n")?;
        assert!(Config::load(Some(config_path)).is_err());
        Ok(())
    }

    #[test]
    fn test_cli_override() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "workers = 8\n")?;

        let cli_args = CommonArgs {
            workers: Some(1),
            color: Some(ColorChoice::Always),
            config: Some(config_path),
            ..CommonArgs::default()
        };
        let final_config = Config::from_cli_and_file(&cli_args)?;
        assert_eq!(final_config.workers, 1);
        assert_eq!(final_config.color, ColorChoice::Always);
        Ok(())
    }

    #[test]
    fn test_get_default_config_path() -> Result<()> {
        let path = get_default_config_path()?;
        assert!(path.ends_with("vcsgrip.toml"));
        Ok(())
    }
}
