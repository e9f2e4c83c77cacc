use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::io::lock::{FileLock, LockError};
use crate::model::document::Document;
use crate::parse::{DocumentError, document_from_value};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("stored snapshot is unusable: {0}")]
    Document(#[from] DocumentError),
}

/// Persistence for the most recent valid snapshot of each project.
///
/// Saves are best-effort from the caller's point of view: a failure is
/// logged and otherwise ignored.
pub trait SnapshotStore: Send + Sync {
    /// Save `doc` as the latest snapshot for the project at `identity`
    fn save(&self, identity: &str, doc: &Document) -> Result<(), StoreError>;

    /// The snapshot saved most recently across all projects
    fn load_last(&self) -> Result<Option<Document>, StoreError>;
}

/// One stored project, without its document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub key: String,
    pub file_name: Option<String>,
    pub path: String,
    pub saved_at: DateTime<Utc>,
    pub tasks: usize,
    pub last: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    last: Option<String>,
    #[serde(default)]
    projects: Vec<StoredProject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProject {
    key: String,
    #[serde(default)]
    file_name: Option<String>,
    path: String,
    saved_at: DateTime<Utc>,
    document: Value,
}

/// Default store location, respecting XDG_DATA_HOME
pub fn default_store_path() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".local").join("share"));
    data_dir.join("taskdeck").join("projects.json")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Derive a store key from a source identity: every character that is not
/// ASCII alphanumeric becomes `_`.
pub fn project_key(identity: &str) -> String {
    identity
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// All projects in a single JSON file, rewritten atomically under a lock.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonSnapshotStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Stored projects, most recently saved first
    pub fn list(&self) -> Vec<ProjectSummary> {
        let file = read_store_from(&self.path);
        let mut out: Vec<ProjectSummary> = file
            .projects
            .iter()
            .map(|p| ProjectSummary {
                key: p.key.clone(),
                file_name: p.file_name.clone(),
                path: p.path.clone(),
                saved_at: p.saved_at,
                tasks: p
                    .document
                    .pointer("/master/tasks")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len),
                last: file.last.as_deref() == Some(p.key.as_str()),
            })
            .collect();
        out.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        out
    }

    /// Load the stored snapshot for one key
    pub fn load(&self, key: &str) -> Result<Option<Document>, StoreError> {
        let file = read_store_from(&self.path);
        let Some(project) = file.projects.into_iter().find(|p| p.key == key) else {
            return Ok(None);
        };
        Ok(Some(document_from_value(project.document)?))
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn save(&self, identity: &str, doc: &Document) -> Result<(), StoreError> {
        let _lock = FileLock::acquire_default(&self.lock_path())?;

        let mut file = read_store_from(&self.path);
        let key = project_key(identity);
        let entry = StoredProject {
            key: key.clone(),
            file_name: doc.file_name.clone().or_else(|| {
                Path::new(identity)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
            }),
            path: identity.to_string(),
            saved_at: Utc::now(),
            document: serde_json::to_value(doc)?,
        };
        match file.projects.iter_mut().find(|p| p.key == key) {
            Some(existing) => *existing = entry,
            None => file.projects.push(entry),
        }
        file.last = Some(key);

        let content = serde_json::to_string_pretty(&file)?;
        atomic_write(&self.path, content.as_bytes())?;
        tracing::debug!(store = %self.path.display(), identity, "snapshot saved");
        Ok(())
    }

    fn load_last(&self) -> Result<Option<Document>, StoreError> {
        let file = read_store_from(&self.path);
        let Some(last) = file.last else {
            return Ok(None);
        };
        let Some(project) = file.projects.into_iter().find(|p| p.key == last) else {
            return Ok(None);
        };
        Ok(Some(document_from_value(project.document)?))
    }
}

/// Read the store file. A missing file is an empty store; a corrupted one is
/// backed up as `.bak` and treated as empty.
fn read_store_from(path: &Path) -> StoreFile {
    if !path.exists() {
        return StoreFile::default();
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<StoreFile>(&content) {
            Ok(file) => file,
            Err(e) => {
                let bak = path.with_extension("json.bak");
                let _ = fs::copy(path, &bak);
                tracing::warn!(
                    store = %path.display(),
                    backup = %bak.display(),
                    error = %e,
                    "could not parse snapshot store, starting fresh"
                );
                StoreFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(store = %path.display(), error = %e, "could not read snapshot store");
            StoreFile::default()
        }
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::Tag;
    use crate::model::task::{Status, Task};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, JsonSnapshotStore) {
        let tmp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(tmp.path().join("data").join("projects.json"));
        (tmp, store)
    }

    fn doc(titles: &[&str]) -> Document {
        let tasks = titles
            .iter()
            .enumerate()
            .map(|(i, t)| Task::new(i as u64 + 1, t, Status::Pending))
            .collect();
        Document::new(Tag::new(tasks))
    }

    #[test]
    fn empty_store_has_nothing() {
        let (_tmp, store) = temp_store();
        assert!(store.load_last().unwrap().is_none());
        assert!(store.list().is_empty());
    }

    #[test]
    fn save_then_load_last() {
        let (_tmp, store) = temp_store();
        store.save("/work/a/tasks.json", &doc(&["one", "two"])).unwrap();
        let loaded = store.load_last().unwrap().unwrap();
        assert_eq!(loaded.master().tasks.len(), 2);
        assert_eq!(loaded.master().tasks[1].title, "two");
        assert!(store.lock_path().exists());
    }

    #[test]
    fn resave_replaces_and_tracks_last() {
        let (_tmp, store) = temp_store();
        store.save("/work/a/tasks.json", &doc(&["a1"])).unwrap();
        store.save("/work/b/tasks.json", &doc(&["b1", "b2"])).unwrap();
        store.save("/work/a/tasks.json", &doc(&["a1", "a2", "a3"])).unwrap();

        let list = store.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].key, "_work_a_tasks_json");
        assert_eq!(list[0].tasks, 3);
        assert!(list[0].last);
        assert_eq!(list[0].file_name.as_deref(), Some("tasks.json"));
        assert!(!list[1].last);

        let last = store.load_last().unwrap().unwrap();
        assert_eq!(last.master().tasks.len(), 3);
        let b = store.load("_work_b_tasks_json").unwrap().unwrap();
        assert_eq!(b.master().tasks.len(), 2);
        assert!(store.load("missing").unwrap().is_none());
    }

    #[test]
    fn corrupted_store_is_backed_up() {
        let (_tmp, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load_last().unwrap().is_none());
        assert!(store.path().with_extension("json.bak").exists());

        store.save("/x/tasks.json", &doc(&["fresh"])).unwrap();
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn keys_are_sanitized() {
        assert_eq!(project_key("/home/me/proj/tasks.json"), "_home_me_proj_tasks_json");
        assert_eq!(project_key("abc123"), "abc123");
    }
}
