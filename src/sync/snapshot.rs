use std::sync::{Arc, RwLock};

use crate::model::document::Document;

/// The current document, shared by readers and replaced whole by the
/// reconciler. Readers hold on to the `Arc` they cloned; a replacement never
/// mutates a document someone is looking at.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Option<Arc<Document>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<Document>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Install `doc`, returning the document it replaced
    pub fn replace(&self, doc: Arc<Document>) -> Option<Arc<Document>> {
        self.current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(doc)
    }
}
