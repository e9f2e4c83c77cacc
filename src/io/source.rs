use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Raw content of a source together with its modification time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRead {
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub modified_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("reading {identity} timed out after {timeout:?}")]
    Timeout { identity: String, timeout: Duration },
    #[error("{0}")]
    Unavailable(String),
}

/// A readable, re-readable handle to a task document.
///
/// The reconciler only ever asks for the whole content plus a modification
/// timestamp; where the bytes come from is up to the implementation.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn read(&self) -> Result<SourceRead, SourceError>;

    /// Stable identity used to key the snapshot store
    fn identity(&self) -> &str;

    /// Short display name
    fn name(&self) -> &str;
}

/// A task document on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
    identity: String,
    name: String,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identity = std::fs::canonicalize(&path)
            .unwrap_or_else(|_| path.clone())
            .to_string_lossy()
            .to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| identity.clone());
        LocalFileSource {
            path,
            identity,
            name,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, source: std::io::Error) -> SourceError {
        SourceError::Read {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl FileSource for LocalFileSource {
    async fn read(&self) -> Result<SourceRead, SourceError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.read_error(e))?;
        let modified = metadata.modified().map_err(|e| self.read_error(e))?;
        // Non-UTF-8 bytes surface here as InvalidData
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.read_error(e))?;
        Ok(SourceRead {
            content,
            modified_at: DateTime::<Utc>::from(modified).timestamp_millis(),
        })
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn name(&self) -> &str {
        &self.name
    }
}
