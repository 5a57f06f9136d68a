//! Ordering constraints between jobs
//!
//! A job depends on every other job whose repository path is one of its
//! ancestor directories, so parent checkouts exist before nested ones are
//! cloned into them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::domain::Job;
use crate::error::{CoreError, Result};

/// Fill each job's dependency set with the job paths that are its ancestors
pub fn add_dependencies(jobs: &mut [Job]) {
    let paths: BTreeSet<PathBuf> = jobs.iter().map(|job| job.path().to_path_buf()).collect();
    for job in jobs.iter_mut() {
        job.depends = ancestors_in(job.path(), &paths);
    }
}

fn ancestors_in(path: &Path, paths: &BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
    path.ancestors()
        .skip(1)
        .filter(|ancestor| paths.contains(*ancestor))
        .map(Path::to_path_buf)
        .collect()
}

/// Reject dependency sets that can never be satisfied
///
/// Dependencies on paths no job produces and cycles between jobs would both
/// leave jobs pending forever.
pub fn validate_dependencies(jobs: &[Job]) -> Result<()> {
    let graph: BTreeMap<&Path, &BTreeSet<PathBuf>> =
        jobs.iter().map(|job| (job.path(), &job.depends)).collect();

    for job in jobs {
        if let Some(missing) = job.depends.iter().find(|dep| !graph.contains_key(dep.as_path())) {
            return Err(CoreError::InvalidCommand {
                reason: format!(
                    "'{}' depends on '{}' which is not part of the job set",
                    job.path().display(),
                    missing.display()
                ),
            });
        }
    }

    match find_cycle(&graph) {
        Some(paths) => Err(CoreError::DependencyCycle { paths }),
        None => Ok(()),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

fn find_cycle(graph: &BTreeMap<&Path, &BTreeSet<PathBuf>>) -> Option<Vec<PathBuf>> {
    let mut marks: BTreeMap<&Path, Mark> = BTreeMap::new();
    let mut stack: Vec<&Path> = Vec::new();
    for start in graph.keys() {
        if let Some(cycle) = visit(*start, graph, &mut marks, &mut stack) {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    node: &'a Path,
    graph: &BTreeMap<&'a Path, &'a BTreeSet<PathBuf>>,
    marks: &mut BTreeMap<&'a Path, Mark>,
    stack: &mut Vec<&'a Path>,
) -> Option<Vec<PathBuf>> {
    match marks.get(node) {
        Some(Mark::Done) => return None,
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|p| *p == node).unwrap_or(0);
            let mut cycle: Vec<PathBuf> = stack[start..].iter().map(|p| p.to_path_buf()).collect();
            cycle.push(node.to_path_buf());
            return Some(cycle);
        }
        None => {}
    }

    marks.insert(node, Mark::Visiting);
    stack.push(node);
    if let Some(deps) = graph.get(node) {
        for dep in deps.iter() {
            if let Some((key, _)) = graph.get_key_value(dep.as_path()) {
                if let Some(cycle) = visit(*key, graph, marks, stack) {
                    return Some(cycle);
                }
            }
        }
    }
    stack.pop();
    marks.insert(node, Mark::Done);
    None
}
