use anyhow::Result;
use std::io::Write;
use vcsgrip_core::domain::{Operation, RepoHandle};

use super::{exit_code, Invocation};
use crate::cli::SearchArgs;
use crate::crawler::find_repositories;
use crate::executor::execute_jobs;
use crate::jobs::generate_jobs;
use crate::output::{output_results, Reporter};

/// Crawl the search paths and run `operation` on every repository found
pub fn run<W: Write>(
    operation: Operation,
    search: &SearchArgs,
    invocation: &Invocation,
    out: &mut W,
) -> Result<i32> {
    let repos = find_repositories(&search.paths, search.nested);
    let hide_empty = search.hide_empty || invocation.config.hide_empty;
    run_on_repositories(&repos, &operation, hide_empty, invocation, out)
}

pub fn run_on_repositories<W: Write>(
    repos: &[RepoHandle],
    operation: &Operation,
    hide_empty: bool,
    invocation: &Invocation,
    out: &mut W,
) -> Result<i32> {
    let mut reporter = Reporter::new(out, invocation.palette);
    if invocation.list_repos {
        reporter.output_repositories(repos)?;
    }

    let jobs = generate_jobs(repos, operation);
    let results = execute_jobs(jobs, &invocation.executor_options(true), reporter.stream());

    output_results(&results, |result, hide| reporter.output_result(result, hide), hide_empty)?;
    Ok(exit_code(&results))
}
