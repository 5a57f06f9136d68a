use anyhow::Result;
use std::io::Write;
use vcsgrip_core::domain::{Operation, RepoHandle, RepoKind};

use super::{simple, Invocation};
use crate::cli::CustomArgs;
use crate::crawler::find_repositories;

/// Run arbitrary arguments with each repository's own executable
pub fn run<W: Write>(args: &CustomArgs, invocation: &Invocation, out: &mut W) -> Result<i32> {
    let kinds = selected_kinds(args);
    let repos: Vec<RepoHandle> = find_repositories(&args.search.paths, args.search.nested)
        .into_iter()
        .filter(|repo| kinds.contains(&repo.kind))
        .collect();

    let operation = Operation::Custom { args: args.client_args.clone() };
    let hide_empty = args.search.hide_empty || invocation.config.hide_empty;
    simple::run_on_repositories(&repos, &operation, hide_empty, invocation, out)
}

/// Kinds chosen with `--git` etc, all of them when none is given
fn selected_kinds(args: &CustomArgs) -> Vec<RepoKind> {
    let flags = [
        (RepoKind::Bzr, args.bzr),
        (RepoKind::Git, args.git),
        (RepoKind::Hg, args.hg),
        (RepoKind::Svn, args.svn),
    ];
    let selected: Vec<RepoKind> = flags
        .iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(kind, _)| *kind)
        .collect();
    if selected.is_empty() {
        RepoKind::VERSION_CONTROLLED.to_vec()
    } else {
        selected
    }
}
