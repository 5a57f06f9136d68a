use anyhow::Result;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use vcsgrip_core::domain::{JobResult, Operation, ReturnCode};

use super::{exit_code, Invocation};
use crate::cli::ExportArgs;
use crate::crawler::find_repositories;
use crate::executor::execute_jobs;
use crate::jobs::generate_jobs;
use crate::output::{display_order, Palette, Reporter};

/// Print a repository list for everything below `args.path`
///
/// The list goes to `out`; repositories that could not be exported are
/// listed on `err`.
pub fn run<W: Write, E: Write>(
    args: &ExportArgs,
    invocation: &Invocation,
    out: &mut W,
    err: &mut E,
) -> Result<i32> {
    let repos = find_repositories(&[&args.path], args.nested);
    let mut reporter = Reporter::new(out, invocation.palette);
    if invocation.list_repos {
        reporter.output_repositories(&repos)?;
    }

    let operation = Operation::Export {
        exact: args.exact || args.exact_with_tags,
        with_tags: args.exact_with_tags,
    };
    let jobs = generate_jobs(&repos, &operation);
    let results = execute_jobs(jobs, &invocation.executor_options(false), &mut io::sink());

    let paths = export_paths(&results, &args.path);
    let order = display_order(&results);

    let document = export_document(&results, &paths, &order)?;
    reporter.write_line(document.trim_end())?;
    for &index in &order {
        if let Some(line) = error_line(&results[index], &paths[index], invocation.palette) {
            writeln!(err, "{line}")?;
        }
    }

    Ok(exit_code(&results))
}

/// Paths relative to `root`, prefixed by the root's name when it is a repository itself
fn export_paths(results: &[JobResult], root: &Path) -> Vec<String> {
    let relative: Vec<PathBuf> = results
        .iter()
        .map(|result| {
            result
                .path()
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| result.path().to_path_buf())
        })
        .collect();

    let root_is_repository = relative.iter().any(|path| path.as_os_str().is_empty());
    let basename = root_is_repository
        .then(|| fs::canonicalize(root).or_else(|_| std::path::absolute(root)).ok())
        .flatten()
        .and_then(|resolved| resolved.file_name().map(PathBuf::from));

    relative
        .into_iter()
        .map(|path| match &basename {
            Some(basename) => basename.join(path),
            None if path.as_os_str().is_empty() => PathBuf::from("."),
            None => path,
        })
        .map(|path| {
            // joining an empty path leaves a trailing separator
            let text = path.display().to_string();
            text.trim_end_matches('/').to_string()
        })
        .collect()
}

/// A repos file listing every exported result, keyed by path in `order`
fn export_document(results: &[JobResult], paths: &[String], order: &[usize]) -> Result<String> {
    let mut repositories = Mapping::new();
    for &index in order {
        if let Some(entry) = export_entry(&results[index]) {
            repositories.insert(Value::from(paths[index].as_str()), Value::Mapping(entry));
        }
    }
    let mut document = Mapping::new();
    document.insert(Value::from("repositories"), Value::Mapping(repositories));
    Ok(serde_yaml::to_string(&document)?)
}

fn export_entry(result: &JobResult) -> Option<Mapping> {
    if result.code() != ReturnCode::Success {
        return None;
    }
    let export = result.outcome.export.as_ref()?;
    let mut entry = Mapping::new();
    entry.insert(Value::from("type"), Value::from(result.repo.kind.name()));
    entry.insert(Value::from("url"), Value::from(export.url.as_str()));
    if let Some(version) = export.version.as_deref().filter(|v| !v.is_empty()) {
        entry.insert(Value::from("version"), Value::from(version));
    }
    Some(entry)
}

fn error_line(result: &JobResult, path: &str, palette: Palette) -> Option<String> {
    match result.code() {
        ReturnCode::Success if result.outcome.export.is_none() => Some(palette.error(&format!(
            "Command 'export' failed for path '{}': no export data",
            result.path().display()
        ))),
        ReturnCode::Success => None,
        ReturnCode::Neutral | ReturnCode::NotApplicable => {
            Some(palette.warning(&format!("{path}: {}", result.output())))
        }
        ReturnCode::Failed(_) => Some(palette.error(&format!("{path}: {}", result.output()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos_file::{parse_repositories, RepoEntry};
    use vcsgrip_core::domain::{CommandOutput, ExportData, OperationKind, RepoHandle, RepoKind};

    fn exported(path: &Path, url: &str, version: Option<&str>) -> JobResult {
        JobResult {
            repo: RepoHandle::new(path, RepoKind::Git),
            operation: Some(OperationKind::Export),
            outcome: CommandOutput::new("git remote show", None, "", ReturnCode::Success)
                .with_export(ExportData {
                    url: url.to_string(),
                    version: version.map(str::to_string),
                }),
        }
    }

    #[test]
    fn test_paths_relative_to_root() {
        let root = Path::new("/work/ws");
        let results = vec![
            exported(&root.join("src/a"), "u", None),
            exported(&root.join("b"), "u", None),
        ];
        assert_eq!(export_paths(&results, root), vec!["src/a", "b"]);
    }

    #[test]
    fn test_paths_prefixed_when_root_is_repository() {
        let root = Path::new("/work/ws");
        let results = vec![exported(root, "u", None), exported(&root.join("sub"), "u", None)];
        assert_eq!(export_paths(&results, root), vec!["ws", "ws/sub"]);
    }

    fn document(results: &[JobResult], root: &Path) -> Result<String> {
        let paths = export_paths(results, root);
        export_document(results, &paths, &display_order(results))
    }

    #[test]
    fn test_document_format() -> Result<()> {
        let root = Path::new("/ws");
        let results = vec![
            exported(&root.join("b"), "https://example.com/b.git", None),
            exported(&root.join("a"), "https://example.com/a.git", Some("main")),
        ];
        assert_eq!(
            document(&results, root)?,
            "repositories:\n  a:\n    type: git\n    url: https://example.com/a.git\n    version: main\n  b:\n    type: git\n    url: https://example.com/b.git\n"
        );
        assert_eq!(error_line(&results[0], "b", Palette::plain()), None);
        Ok(())
    }

    #[test]
    fn test_document_reads_back_unchanged() -> Result<()> {
        let root = Path::new("/ws");
        let results = vec![
            exported(&root.join("libs #2"), "https://example.com/libs.git", Some("1.10")),
            exported(&root.join("odd: name"), "file:///srv/repos: old", Some("yes")),
            exported(&root.join("plain"), "https://example.com/plain.git", None),
        ];
        let file = parse_repositories(&document(&results, root)?)?;
        assert!(file.warnings.is_empty());
        assert_eq!(
            file.entries,
            vec![
                RepoEntry {
                    path: "libs #2".to_string(),
                    kind: "git".to_string(),
                    url: "https://example.com/libs.git".to_string(),
                    version: Some("1.10".to_string()),
                },
                RepoEntry {
                    path: "odd: name".to_string(),
                    kind: "git".to_string(),
                    url: "file:///srv/repos: old".to_string(),
                    version: Some("yes".to_string()),
                },
                RepoEntry {
                    path: "plain".to_string(),
                    kind: "git".to_string(),
                    url: "https://example.com/plain.git".to_string(),
                    version: None,
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_empty_document_is_valid() -> Result<()> {
        let text = document(&[], Path::new("/ws"))?;
        let file = parse_repositories(&text)?;
        assert!(file.entries.is_empty());
        Ok(())
    }

    #[test]
    fn test_basename_of_parent_reference() -> Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let workspace = temp_dir.path().join("ws");
        fs::create_dir_all(workspace.join("inner"))?;
        let root = workspace.join("inner").join("..");

        let results = vec![exported(&root, "u", None), exported(&root.join("sub"), "u", None)];
        assert_eq!(export_paths(&results, &root), vec!["ws", "ws/sub"]);
        Ok(())
    }

    #[test]
    fn test_failures_are_listed_separately() {
        let result = JobResult {
            repo: RepoHandle::new("c", RepoKind::Bzr),
            operation: Some(OperationKind::Export),
            outcome: CommandOutput::not_applicable(
                "bzr.export(export)",
                None,
                "Command 'export' not implemented for client 'bzr'",
            ),
        };
        assert_eq!(export_entry(&result), None);
        assert_eq!(
            error_line(&result, "c", Palette::plain()).as_deref(),
            Some("c: Command 'export' not implemented for client 'bzr'")
        );
    }
}
