use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use vcsgrip_core::domain::{JobResult, RepoHandle, ReturnCode};

/// When to emit ANSI colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// Colors for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(choice: ColorChoice, is_tty: bool) -> Self {
        let enabled = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => is_tty,
        };
        Self { enabled }
    }

    /// Resolve `auto` against whether stdout is a terminal
    pub fn detect(choice: ColorChoice) -> Self {
        Self::new(choice, io::stdout().is_tty())
    }

    pub fn plain() -> Self {
        Self { enabled: false }
    }

    pub fn header(&self, repo: &RepoHandle) -> String {
        let path = repo.path.display().to_string();
        let kind = format!(" ({}) ===", repo.kind);
        if self.enabled {
            format!("{}{}{}", "=== ".blue(), path.blue().bold(), kind.blue())
        } else {
            format!("=== {path}{kind}")
        }
    }

    pub fn warning(&self, text: &str) -> String {
        if self.enabled {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn error(&self, text: &str) -> String {
        if self.enabled {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Writes results and listings to one stream
pub struct Reporter<W: Write> {
    out: W,
    palette: Palette,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self { out, palette }
    }

    /// The underlying stream, e.g. for progress glyphs
    pub fn stream(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Header plus output for one result
    ///
    /// With `hide_empty` the header is dropped when there is nothing to show
    /// and informational output of neutral results is suppressed.
    pub fn output_result(&mut self, result: &JobResult, hide_empty: bool) -> io::Result<()> {
        let mut output = result.output().to_string();
        if hide_empty && result.code() == ReturnCode::Neutral {
            output.clear();
        }
        let output = match result.code() {
            ReturnCode::NotApplicable if !output.is_empty() => self.palette.warning(&output),
            ReturnCode::NotApplicable => output,
            ReturnCode::Failed(code) => {
                if output.is_empty() {
                    output = format!("Failed with return code {code}");
                }
                self.palette.error(&output)
            }
            _ if result.outcome.cmd.is_empty() && !output.is_empty() => {
                self.palette.warning(&output)
            }
            _ => output,
        };

        if !output.is_empty() || !hide_empty {
            writeln!(self.out, "{}", self.palette.header(&result.repo))?;
        }
        if !output.is_empty() {
            writeln!(self.out, "{output}")?;
        }
        Ok(())
    }

    /// One `<path> (<type>)` line per repository, sorted by path
    pub fn output_repositories(&mut self, repos: &[RepoHandle]) -> io::Result<()> {
        let mut sorted: Vec<&RepoHandle> = repos.iter().collect();
        sorted.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));
        sorted.dedup_by(|a, b| a.path == b.path);
        for repo in sorted {
            writeln!(self.out, "{repo}")?;
        }
        Ok(())
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")
    }
}

/// Indices of `results` in ascending path order
pub fn display_order(results: &[JobResult]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by(|&a, &b| results[a].path().as_os_str().cmp(results[b].path().as_os_str()));
    order
}

/// Hand every result to `handler` in ascending path order
pub fn output_results<F>(results: &[JobResult], mut handler: F, hide_empty: bool) -> io::Result<()>
where
    F: FnMut(&JobResult, bool) -> io::Result<()>,
{
    for index in display_order(results) {
        handler(&results[index], hide_empty)?;
    }
    Ok(())
}
