use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Invocation;
use crate::cli::RmAllArgs;
use crate::clients::process::remove_path;
use crate::repos_file::{read_repositories, RepoEntry};

/// Delete every checkout listed in the input file below `args.path`
///
/// All messages go to `err`. Removal failures, such as already missing
/// paths, are only logged.
pub fn run<E: Write>(args: &RmAllArgs, invocation: &Invocation, err: &mut E) -> Result<i32> {
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

    let paths = removal_paths(&file.entries, &args.path);
    writeln!(err, "{}", palette.warning("Paths to delete:"))?;
    writeln!(err)?;
    for path in &paths {
        writeln!(err, "- {}", path.display())?;
    }

    if args.dry_run {
        writeln!(err, "\n[Dry Run]")?;
        return Ok(0);
    }

    for path in &paths {
        if let Err(e) = remove_path(path) {
            debug!("could not remove '{}': {:#}", path.display(), e);
        }
    }
    Ok(0)
}

fn removal_paths(entries: &[RepoEntry], base: &Path) -> Vec<PathBuf> {
    entries.iter().map(|entry| base.join(&entry.path)).collect()
}
