use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use vcsgrip_core::domain::{Job, Operation, RepoHandle};

use crate::clients::client_for;

/// One job per repository, with duplicate paths already marked
pub fn generate_jobs(repos: &[RepoHandle], operation: &Operation) -> Vec<Job> {
    let mut jobs: Vec<Job> = repos
        .iter()
        .map(|repo| match client_for(repo.kind, &repo.path) {
            Some(client) => Job::new(client, operation.clone()),
            None => Job::unsupported(
                repo.clone(),
                format!("Repository type '{}' is not supported", repo.kind),
            ),
        })
        .collect();
    mark_duplicates(&mut jobs);
    jobs
}

/// Turn every job after the first on the same real path into a no-op
pub fn mark_duplicates(jobs: &mut [Job]) {
    let mut first_by_real_path: HashMap<PathBuf, PathBuf> = HashMap::new();
    for job in jobs.iter_mut() {
        let real_path = fs::canonicalize(job.path()).unwrap_or_else(|_| job.path().to_path_buf());
        match first_by_real_path.get(&real_path) {
            Some(first) => {
                debug!(
                    "'{}' is the same repository as '{}'",
                    job.path().display(),
                    first.display()
                );
                job.mark_duplicate(first.clone());
            }
            None => {
                first_by_real_path.insert(real_path, job.path().to_path_buf());
            }
        }
    }
}
