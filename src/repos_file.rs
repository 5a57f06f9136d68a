//! Repository list files
//!
//! The primary format maps relative paths to their type, url and optional
//! version under a top level `repositories` key. The older rosinstall format,
//! a list of single key maps named by type, is accepted as a fallback.

use serde_yaml::{Mapping, Value};
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;
use vcsgrip_core::CoreError;

#[derive(Debug, Error)]
pub enum ReposFileError {
    #[error("Input data is not valid yaml format: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Format(#[from] CoreError),

    #[error("Failed to read {origin}: {source}")]
    Read {
        origin: String,
        #[source]
        source: io::Error,
    },
}

/// One repository listed in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    /// Relative checkout path as written in the file
    pub path: String,
    /// VCS type name, not necessarily one with a client
    pub kind: String,
    pub url: String,
    pub version: Option<String>,
}

/// Parsed entries in file order plus warnings about skipped ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReposFile {
    pub entries: Vec<RepoEntry>,
    pub warnings: Vec<String>,
}

/// Read a repository list from `input`, or stdin when `None`
pub fn read_repositories(input: Option<&Path>) -> Result<ReposFile, ReposFileError> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path).map_err(|source| ReposFileError::Read {
            origin: format!("'{}'", path.display()),
            source,
        })?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .map_err(|source| ReposFileError::Read {
                    origin: "standard input".to_string(),
                    source,
                })?;
            text
        }
    };
    parse_repositories(&text)
}

pub fn parse_repositories(text: &str) -> Result<ReposFile, ReposFileError> {
    let root: Value = serde_yaml::from_str(text)?;
    match &root {
        Value::Mapping(map) => match map.get("repositories") {
            Some(repositories) => Ok(repositories_map(repositories)?),
            None => Err(invalid("'repositories'").into()),
        },
        Value::Sequence(items) => Ok(rosinstall_format(items)?),
        _ => Err(invalid("expected a mapping with a 'repositories' key").into()),
    }
}

fn invalid(reason: &str) -> CoreError {
    CoreError::InvalidReposFile { reason: reason.to_string() }
}

fn repositories_map(repositories: &Value) -> Result<ReposFile, CoreError> {
    let mut file = ReposFile::default();
    let map = match repositories {
        Value::Null => {
            file.warnings.push("List of repositories is empty".to_string());
            return Ok(file);
        }
        Value::Mapping(map) => map,
        _ => return Err(invalid("'repositories' must map paths to repositories")),
    };

    for (key, attributes) in map {
        let Some(path) = scalar_string(key) else {
            return Err(invalid("repository paths must be scalars"));
        };
        let Some(attributes) = attributes.as_mapping() else {
            file.warnings.push(missing_info(&format!("Repository '{path}'"), "type"));
            continue;
        };
        let kind = lookup(attributes, "type");
        let url = lookup(attributes, "url");
        match (kind, url) {
            (Some(kind), Some(url)) => file.entries.push(RepoEntry {
                path,
                kind,
                url,
                version: lookup(attributes, "version"),
            }),
            (None, _) => file.warnings.push(missing_info(&format!("Repository '{path}'"), "type")),
            (_, None) => file.warnings.push(missing_info(&format!("Repository '{path}'"), "url")),
        }
    }
    Ok(file)
}

fn rosinstall_format(items: &[Value]) -> Result<ReposFile, CoreError> {
    let mut file = ReposFile::default();
    for (index, item) in items.iter().enumerate() {
        let Some((kind, attributes)) = item
            .as_mapping()
            .filter(|map| map.len() == 1)
            .and_then(|map| map.iter().next())
        else {
            return Err(invalid("each list item must be a single key mapping"));
        };
        let Some(kind) = scalar_string(kind) else {
            return Err(invalid("repository types must be scalars"));
        };
        let empty = Mapping::new();
        let attributes = attributes.as_mapping().unwrap_or(&empty);

        let Some(path) = lookup(attributes, "local-name") else {
            file.warnings.push(missing_info(&format!("Repository #{index}"), "local-name"));
            continue;
        };
        let Some(url) = lookup(attributes, "uri") else {
            file.warnings.push(missing_info(&format!("Repository '{path}'"), "uri"));
            continue;
        };
        file.entries.push(RepoEntry {
            path,
            kind,
            url,
            version: lookup(attributes, "version"),
        });
    }
    Ok(file)
}

fn missing_info(subject: &str, key: &str) -> String {
    format!("{subject} does not provide the necessary information: '{key}'")
}

fn lookup(map: &Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(scalar_string)
}

/// Strings, numbers and booleans as text; unquoted numbers lose trailing zeros
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
