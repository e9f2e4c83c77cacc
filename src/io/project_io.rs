use std::fs;
use std::path::{Path, PathBuf};

use crate::model::document::Document;
use crate::parse::{DocumentError, parse_document};

/// Conventional location of the task document inside a project
pub const TASKS_FILE: &str = ".taskmaster/tasks/tasks.json";

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("no {TASKS_FILE} found in this directory or any parent (use --file)")]
    NotFound,
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Invalid {
        path: PathBuf,
        source: DocumentError,
    },
}

/// Find the task document by walking up from `start`
pub fn discover_tasks_file(start: &Path) -> Result<PathBuf, ProjectError> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(TASKS_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(ProjectError::NotFound);
        }
    }
}

/// Read and parse a task document from disk
pub fn load_document(path: &Path) -> Result<Document, ProjectError> {
    let text = fs::read_to_string(path).map_err(|e| ProjectError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_document(&text).map_err(|e| ProjectError::Invalid {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_project(root: &Path, body: &str) -> PathBuf {
        let path = root.join(TASKS_FILE);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn discovers_from_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let expected = create_project(tmp.path(), r#"{"master": {"tasks": []}}"#);

        assert_eq!(discover_tasks_file(tmp.path()).unwrap(), expected);

        let sub = tmp.path().join("src").join("deep");
        fs::create_dir_all(&sub).unwrap();
        assert_eq!(discover_tasks_file(&sub).unwrap(), expected);
    }

    #[test]
    fn discovery_fails_without_project() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            discover_tasks_file(tmp.path()),
            Err(ProjectError::NotFound)
        ));
    }

    #[test]
    fn loads_and_reports_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = create_project(tmp.path(), r#"{"master": {"tasks": [{"id": 1}]}}"#);
        assert_eq!(load_document(&path).unwrap().master().tasks.len(), 1);

        fs::write(&path, r#"{"tags": {}}"#).unwrap();
        assert!(matches!(
            load_document(&path),
            Err(ProjectError::Invalid { .. })
        ));
        assert!(matches!(
            load_document(&tmp.path().join("nope.json")),
            Err(ProjectError::Read { .. })
        ));
    }
}
