use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::task::Task;

/// Name of the tag every valid document must carry
pub const MASTER_TAG: &str = "master";

/// Metadata block of a tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMetadata {
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A named partition of tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub metadata: TagMetadata,
}

impl Tag {
    pub fn new(tasks: Vec<Task>) -> Self {
        Tag {
            tasks,
            metadata: TagMetadata::default(),
        }
    }

    /// Heading for this tag: description, then name, then a fallback
    pub fn title(&self) -> &str {
        let meta = &self.metadata;
        if !meta.description.is_empty() {
            &meta.description
        } else {
            meta.name
                .as_deref()
                .filter(|n| !n.is_empty())
                .unwrap_or("Project Overview")
        }
    }
}

/// A fully parsed task document.
///
/// The `master` tag is held apart from the others so a `Document` can never
/// exist without it. Additional tags keep their document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    master: Tag,
    tags: IndexMap<String, Tag>,
    /// Source file name, carried out of band
    pub file_name: Option<String>,
}

impl Document {
    pub fn new(master: Tag) -> Self {
        Document {
            master,
            tags: IndexMap::new(),
            file_name: None,
        }
    }

    /// Add (or replace) an additional tag. Passing `master` replaces the master tag.
    pub fn with_tag(mut self, name: &str, tag: Tag) -> Self {
        if name == MASTER_TAG {
            self.master = tag;
        } else {
            self.tags.insert(name.to_string(), tag);
        }
        self
    }

    pub fn with_file_name(mut self, file_name: Option<String>) -> Self {
        self.file_name = file_name;
        self
    }

    pub fn master(&self) -> &Tag {
        &self.master
    }

    pub fn tag(&self, name: &str) -> Option<&Tag> {
        if name == MASTER_TAG {
            Some(&self.master)
        } else {
            self.tags.get(name)
        }
    }

    /// All tags, master first, then the rest in document order
    pub fn tags(&self) -> impl Iterator<Item = (&str, &Tag)> {
        std::iter::once((MASTER_TAG, &self.master))
            .chain(self.tags.iter().map(|(name, tag)| (name.as_str(), tag)))
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags().map(|(name, _)| name).collect()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 1 + self.tags.len() + usize::from(self.file_name.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (name, tag) in self.tags() {
            map.serialize_entry(name, tag)?;
        }
        if let Some(file_name) = &self.file_name {
            map.serialize_entry("fileName", file_name)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{Status, Task};

    #[test]
    fn master_always_first() {
        let doc = Document::new(Tag::new(vec![Task::new(1, "a", Status::Pending)]))
            .with_tag("feature-x", Tag::default())
            .with_tag("archive", Tag::default());
        assert_eq!(doc.tag_names(), vec!["master", "feature-x", "archive"]);
        assert_eq!(doc.master().tasks.len(), 1);
        assert!(doc.tag("feature-x").is_some());
        assert!(doc.tag("missing").is_none());
    }

    #[test]
    fn with_tag_master_replaces_master() {
        let doc = Document::new(Tag::default())
            .with_tag(MASTER_TAG, Tag::new(vec![Task::new(9, "z", Status::Done)]));
        assert_eq!(doc.master().tasks[0].title, "z");
        assert_eq!(doc.tag_names(), vec!["master"]);
    }

    #[test]
    fn tag_title_fallbacks() {
        let mut tag = Tag::default();
        assert_eq!(tag.title(), "Project Overview");
        tag.metadata.name = Some("Named".into());
        assert_eq!(tag.title(), "Named");
        tag.metadata.description = "Described".to_string();
        assert_eq!(tag.title(), "Described");
    }
}
