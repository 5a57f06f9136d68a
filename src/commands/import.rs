use anyhow::Result;
use rayon::prelude::*;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};
use vcsgrip_core::app::{add_dependencies, validate_dependencies};
use vcsgrip_core::domain::{ImportParams, Job, Operation, RepoHandle, RepoKind};

use super::{exit_code, Invocation};
use crate::cli::ImportArgs;
use crate::clients::client_for;
use crate::clients::process::CommandLine;
use crate::executor::execute_jobs;
use crate::output::{output_results, Reporter};
use crate::repos_file::{read_repositories, RepoEntry};

/// Clone or update every repository listed in the input file below `args.path`
pub fn run<W: Write, E: Write>(
    args: &ImportArgs,
    invocation: &Invocation,
    out: &mut W,
    err: &mut E,
) -> Result<i32> {
    let palette = invocation.palette;
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

    let template = ImportParams {
        force: args.force,
        skip_existing: args.skip_existing,
        recursive: args.recursive,
        shallow: args.shallow,
        retry: args.retry.unwrap_or(invocation.config.retry),
        ..ImportParams::default()
    };
    let mut jobs = import_jobs(&file.entries, &args.path, &template);
    add_dependencies(&mut jobs);
    validate_dependencies(&jobs)?;

    let mut reporter = Reporter::new(out, palette);
    if invocation.list_repos {
        let repos: Vec<RepoHandle> = jobs.iter().map(|job| job.repo.clone()).collect();
        reporter.output_repositories(&repos)?;
    }

    let mut options = invocation.executor_options(true);
    if options.workers > 1 {
        if let Some(host) = first_unknown_ssh_host(&jobs) {
            reporter.write_line(&format!(
                "At least one hostname ({host}) is unknown, switching to a single worker \
                 to allow interactively answering the ssh question to confirm the fingerprint"
            ))?;
            options.workers = 1;
        }
    }

    let results = execute_jobs(jobs, &options, reporter.stream());
    output_results(&results, |result, hide| reporter.output_result(result, hide), false)?;
    Ok(exit_code(&results))
}

/// One job per entry; types without a client get a job that only reports that
pub fn import_jobs(entries: &[RepoEntry], base: &Path, template: &ImportParams) -> Vec<Job> {
    entries
        .iter()
        .map(|entry| {
            let path = base.join(&entry.path);
            let client = entry
                .kind
                .parse::<RepoKind>()
                .ok()
                .and_then(|kind| client_for(kind, &path));
            match client {
                Some(client) => {
                    let params = ImportParams {
                        url: Some(entry.url.clone()),
                        version: entry.version.clone(),
                        ..template.clone()
                    };
                    Job::new(client, Operation::Import(params))
                }
                None => Job::unsupported(
                    RepoHandle::new(path, RepoKind::None),
                    format!("Repository type '{}' is not supported", entry.kind),
                ),
            }
        })
        .collect()
}

/// Host part of an scp-like ssh url such as `git@host:org/repo.git`
pub fn ssh_host(url: &str) -> Option<&str> {
    url.strip_prefix("git@")?.split_once(':').map(|(host, _)| host)
}

/// First host, in job order, that has no entry in the known hosts file
fn first_unknown_ssh_host(jobs: &[Job]) -> Option<String> {
    let mut hosts: Vec<&str> = Vec::new();
    for job in jobs {
        let Some(Operation::Import(params)) = job.operation() else {
            continue;
        };
        if let Some(host) = params.url.as_deref().and_then(ssh_host) {
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
    }
    if hosts.is_empty() {
        return None;
    }

    let Ok(ssh_keygen) = which::which("ssh-keygen") else {
        debug!("ssh-keygen not found, skipping known hosts check");
        return None;
    };
    hosts
        .par_iter()
        .find_first(|host| !is_known_host(&ssh_keygen, host))
        .map(|host| host.to_string())
}

fn is_known_host(ssh_keygen: &Path, host: &str) -> bool {
    match CommandLine::new(ssh_keygen).args(["-F", host]).run(Path::new("")) {
        Ok(result) => !result.is_failure(),
        Err(e) => {
            warn!("could not check known hosts for '{}': {:#}", host, e);
            false
        }
    }
}
