use std::path::PathBuf;
use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown repository type: {name}")]
    UnknownRepoKind { name: String },

    #[error("Dependency cycle between jobs: {}", display_paths(.paths))]
    DependencyCycle { paths: Vec<PathBuf> },

    #[error("Input data is not valid format: {reason}")]
    InvalidReposFile { reason: String },

    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_paths_in_order() {
        let err = CoreError::DependencyCycle {
            paths: vec![PathBuf::from("a"), PathBuf::from("a/b"), PathBuf::from("a")],
        };
        assert_eq!(err.to_string(), "Dependency cycle between jobs: a -> a/b -> a");
    }
}
