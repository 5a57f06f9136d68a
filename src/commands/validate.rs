use anyhow::Result;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::Path;
use vcsgrip_core::domain::{
    Job, JobAction, JobResult, Operation, RepoHandle, RepoKind, ReturnCode, ValidateParams,
};

use super::{exit_code, Invocation};
use crate::cli::ValidateArgs;
use crate::clients::client_for;
use crate::executor::execute_jobs;
use crate::output::{output_results, Palette, Reporter};
use crate::repos_file::{read_repositories, RepoEntry};

/// Check the input file's format, then that every url and version can be reached
pub fn run<W: Write, E: Write>(
    args: &ValidateArgs,
    invocation: &Invocation,
    out: &mut W,
    err: &mut E,
) -> Result<i32> {
    let palette = invocation.palette;
    writeln!(out, "Validating format...")?;
    let file = match read_repositories(args.input.as_deref()) {
        Ok(file) => file,
        Err(e) => {
            writeln!(err, "{}", palette.error(&e.to_string()))?;
            return Ok(1);
        }
    };
    for warning in &file.warnings {
        writeln!(err, "{}", palette.warning(warning))?;
    }
    writeln!(out, "Format validation succeeded!")?;
    writeln!(out, "Validating endpoints...")?;

    let retry = args.retry.unwrap_or(invocation.config.retry);
    let jobs = validate_jobs(&file.entries, &args.path, retry);
    if invocation.list_repos {
        let repos: Vec<RepoHandle> = jobs.iter().map(|job| job.repo.clone()).collect();
        Reporter::new(&mut *out, palette).output_repositories(&repos)?;
    }
    let results = execute_jobs(jobs, &invocation.executor_options(false), &mut io::sink());

    output_results(&results, |result, _| write_validation(&mut *out, result, palette), false)?;

    let code = exit_code(&results);
    if code != 0 {
        writeln!(err, "An error was encountered while validating an endpoint.")?;
    } else {
        writeln!(out, "Endpoint validation succeeded!")?;
    }
    Ok(code)
}

/// Jobs run from `base` but are reported under the entry's own path
pub fn validate_jobs(entries: &[RepoEntry], base: &Path, retry: u32) -> Vec<Job> {
    entries
        .iter()
        .map(|entry| {
            let kind = entry.kind.parse::<RepoKind>().ok();
            match kind.and_then(|kind| client_for(kind, base).map(|client| (kind, client))) {
                Some((kind, client)) => Job {
                    repo: RepoHandle::new(&entry.path, kind),
                    action: JobAction::Run {
                        client,
                        operation: Operation::Validate(ValidateParams {
                            url: Some(entry.url.clone()),
                            version: entry.version.clone(),
                            retry,
                        }),
                    },
                    depends: BTreeSet::new(),
                },
                None => Job::unsupported(
                    RepoHandle::new(&entry.path, RepoKind::None),
                    format!("Repository type '{}' is not supported", entry.kind),
                ),
            }
        })
        .collect()
}

fn write_validation<W: Write>(out: &mut W, result: &JobResult, palette: Palette) -> io::Result<()> {
    writeln!(out, "{}", palette.header(&result.repo))?;
    match result.code() {
        ReturnCode::Failed(code) => {
            let output = if result.output().is_empty() {
                format!("Failed with return code {code}")
            } else {
                result.output().to_string()
            };
            writeln!(out, "{}", palette.error(&output))
        }
        ReturnCode::NotApplicable => writeln!(out, "{}", palette.warning(result.output())),
        ReturnCode::Success | ReturnCode::Neutral => writeln!(out, "Valid"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcsgrip_core::domain::{CommandOutput, OperationKind};

    #[test]
    fn test_jobs_keep_entry_paths() {
        let entries = vec![
            RepoEntry {
                path: "src/a".to_string(),
                kind: "git".to_string(),
                url: "https://example.com/a.git".to_string(),
                version: Some("v1".to_string()),
            },
            RepoEntry {
                path: "b".to_string(),
                kind: "zip".to_string(),
                url: "https://example.com/b.zip".to_string(),
                version: None,
            },
        ];
        let jobs = validate_jobs(&entries, Path::new("/ws"), 1);
        assert_eq!(jobs[0].repo, RepoHandle::new("src/a", RepoKind::Git));
        assert!(matches!(
            &jobs[0].action,
            JobAction::Run { client, .. } if client.path() == Path::new("/ws")
        ));
        assert_eq!(jobs[1].operation_kind(), None);
    }

    #[test]
    fn test_validation_lines() -> Result<()> {
        let ok = JobResult {
            repo: RepoHandle::new("a", RepoKind::Git),
            operation: Some(OperationKind::Validate),
            outcome: CommandOutput::new(
                "git ls-remote",
                None,
                "Found git repository",
                ReturnCode::Success,
            ),
        };
        let mut out = Vec::new();
        write_validation(&mut out, &ok, Palette::plain())?;
        assert_eq!(String::from_utf8(out)?, "=== a (git) ===\nValid\n");

        let failed = JobResult {
            outcome: CommandOutput::new("git ls-remote", None, "", ReturnCode::Failed(128)),
            ..ok
        };
        let mut out = Vec::new();
        write_validation(&mut out, &failed, Palette::plain())?;
        assert_eq!(String::from_utf8(out)?, "=== a (git) ===\nFailed with return code 128\n");
        Ok(())
    }
}
