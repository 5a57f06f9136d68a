//! Subprocess execution shared by all client adapters

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;
use vcsgrip_core::domain::{CommandOutput, ReturnCode};

/// Delay before the first retry; later retries wait proportionally longer
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Locate an executable on PATH once per process
///
/// Every worker thread may race to resolve the same executable; the
/// `OnceLock` makes the lookup happen exactly once.
pub fn resolve_executable(
    cache: &'static OnceLock<Option<PathBuf>>,
    name: &str,
) -> Result<&'static Path> {
    cache
        .get_or_init(|| {
            let found = which::which(name).ok();
            debug!("resolved executable '{}' to {:?}", name, found);
            found
        })
        .as_deref()
        .with_context(|| format!("Could not find '{name}' executable"))
}

/// An external command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Insert arguments right after the program, e.g. global options
    pub fn prepend_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all: Vec<String> = args.into_iter().map(Into::into).collect();
        all.append(&mut self.args);
        self.args = all;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Space separated rendering used in results
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion, capturing stdout and stderr into one text
    ///
    /// The working directory is only applied when it exists. Failure to spawn
    /// the process is an error; a non-zero exit status is a `Failed` result.
    pub fn run(&self, cwd: &Path) -> Result<CommandOutput> {
        let cwd = std::path::absolute(cwd).unwrap_or_else(|_| cwd.to_path_buf());
        let cwd = cwd.is_dir().then_some(cwd);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = &cwd {
            command.current_dir(dir);
        }

        debug!("running '{}' in {:?}", self.display(), cwd);
        let output = command
            .output()
            .with_context(|| format!("Failed to run '{}'", self.display()))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.trim_end().is_empty() {
                text = text.trim_end().to_string();
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        Ok(CommandOutput::new(
            self.display(),
            cwd,
            text.trim_end(),
            ReturnCode::from_exit_code(output.status.code()),
        ))
    }

    /// Run, re-running a failed attempt up to `retry` more times
    pub fn run_with_retry(&self, cwd: &Path, retry: u32) -> Result<CommandOutput> {
        retry_with_backoff(retry, RETRY_BASE_DELAY, || self.run(cwd))
    }
}

/// Repeat `attempt` while it reports a failure, sleeping `base * n` before the n-th retry
pub fn retry_with_backoff<F>(retry: u32, base: Duration, mut attempt: F) -> Result<CommandOutput>
where
    F: FnMut() -> Result<CommandOutput>,
{
    let mut result = attempt()?;
    for n in 1..=retry {
        if !result.is_failure() {
            break;
        }
        debug!("retry {}/{} after failure: {}", n, retry, result.cmd);
        std::thread::sleep(base * n);
        result = attempt()?;
    }
    Ok(result)
}

/// Compute a process-wide flag once, a failing check counts as `false`
pub fn cached_flag<F>(cache: &OnceLock<bool>, check: F) -> bool
where
    F: FnOnce() -> Result<bool>,
{
    *cache.get_or_init(|| {
        check().unwrap_or_else(|e| {
            debug!("flag check failed, assuming false: {:#}", e);
            false
        })
    })
}

/// True if `path` holds a directory named `marker`
pub fn has_marker_dir(path: &Path, marker: &str) -> bool {
    path.join(marker).is_dir()
}

/// Create the checkout directory, reporting failure as a result
pub fn create_path(path: &Path) -> Option<CommandOutput> {
    if path.exists() {
        return None;
    }
    match std::fs::create_dir_all(path) {
        Ok(()) => None,
        Err(e) => Some(CommandOutput::new(
            format!("create_dir_all({})", path.display()),
            Some(path.to_path_buf()),
            format!("Could not create directory '{}': {}", path.display(), e),
            ReturnCode::Failed(1),
        )),
    }
}

/// Remove a directory tree or file
pub fn remove_path(path: &Path) -> Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
    .with_context(|| format!("Failed to remove '{}'", path.display()))
}

/// Chain two command results into one description
pub fn join_cmds(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{first} && {second}"),
    }
}

/// Join outputs, skipping empty parts
pub fn join_outputs(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_cached_flag_computed_once_across_threads() {
        let cache = OnceLock::new();
        let checks = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let flag = cached_flag(&cache, || {
                        checks.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(10));
                        Ok(true)
                    });
                    assert!(flag);
                });
            }
        });
        assert_eq!(checks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cached_flag_failed_check_is_false() {
        let cache = OnceLock::new();
        assert!(!cached_flag(&cache, || anyhow::bail!("git not found")));
        assert!(!cached_flag(&cache, || Ok(true)));
    }

    #[test]
    fn test_display_joins_program_and_args() {
        let cmd = CommandLine::new("git").arg("status").args(["--untracked-files=no"]);
        assert_eq!(cmd.display(), "git status --untracked-files=no");

        let colored = cmd.prepend_args(["-c", "color.ui=always"]);
        assert_eq!(colored.display(), "git -c color.ui=always status --untracked-files=no");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_both_streams_and_exit_code() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let output = CommandLine::new("sh")
            .args(["-c", "echo out; echo err >&2; exit 3"])
            .run(temp_dir.path())?;
        assert_eq!(output.output, "out\nerr");
        assert_eq!(output.code, ReturnCode::Failed(3));
        assert_eq!(output.cmd, "sh -c echo out; echo err >&2; exit 3");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_run_uses_existing_cwd_only() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let output = CommandLine::new("sh").args(["-c", "pwd"]).run(temp_dir.path())?;
        assert_eq!(output.code, ReturnCode::Success);
        assert!(output.cwd.is_some());

        let missing = temp_dir.path().join("missing");
        let output = CommandLine::new("sh").args(["-c", "true"]).run(&missing)?;
        assert_eq!(output.cwd, None);
        assert_eq!(output.code, ReturnCode::Success);
        Ok(())
    }

    #[test]
    fn test_spawn_failure_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let result = CommandLine::new("definitely-not-a-real-vcs-binary").run(temp_dir.path());
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_retry_stops_after_success() -> Result<()> {
        let calls = Cell::new(0);
        let result = retry_with_backoff(5, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            let code = if calls.get() < 3 { ReturnCode::Failed(1) } else { ReturnCode::Success };
            Ok(CommandOutput::new("git fetch", None, "", code))
        })?;
        assert_eq!(calls.get(), 3);
        assert_eq!(result.code, ReturnCode::Success);
        Ok(())
    }

    #[test]
    fn test_retry_returns_last_failure() -> Result<()> {
        let calls = Cell::new(0);
        let result = retry_with_backoff(2, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Ok(CommandOutput::new("git fetch", None, "offline", ReturnCode::Failed(128)))
        })?;
        assert_eq!(calls.get(), 3);
        assert_eq!(result.code, ReturnCode::Failed(128));
        Ok(())
    }

    #[test]
    fn test_create_path() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let nested = temp_dir.path().join("a/b/c");
        assert!(create_path(&nested).is_none());
        assert!(nested.is_dir());
        assert!(create_path(&nested).is_none());
        Ok(())
    }

    #[test]
    fn test_join_helpers() {
        assert_eq!(
            join_cmds("git clone x .", "git checkout main"),
            "git clone x . && git checkout main"
        );
        assert_eq!(join_cmds("", "git checkout main"), "git checkout main");
        assert_eq!(join_outputs(&["Cloning", "", "Switched"]), "Cloning\nSwitched");
    }
}
