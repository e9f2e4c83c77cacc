use serde_json::{Map, Value};

use crate::model::document::{Document, MASTER_TAG, Tag, TagMetadata};
use crate::model::task::Task;

/// Error type for document parsing
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("invalid structure: missing 'master.tasks'")]
    MissingMaster,
}

/// Parse a task document from JSON text.
///
/// The only structural requirement is a `master` object holding a `tasks`
/// array. Every other top-level object with a `tasks` array becomes an
/// additional tag; other keys are ignored. A top-level `fileName` string is
/// picked up as the document's file name.
pub fn parse_document(text: &str) -> Result<Document, DocumentError> {
    let root: Value = serde_json::from_str(text)?;
    document_from_value(root)
}

/// Build a document from an already-parsed JSON value
pub fn document_from_value(root: Value) -> Result<Document, DocumentError> {
    let Value::Object(mut root) = root else {
        return Err(DocumentError::MissingMaster);
    };

    let master_value = root.shift_remove(MASTER_TAG).ok_or(DocumentError::MissingMaster)?;
    let master = decode_tag(MASTER_TAG, master_value).ok_or(DocumentError::MissingMaster)?;

    let file_name = match root.shift_remove("fileName") {
        Some(Value::String(name)) => Some(name),
        _ => None,
    };

    let mut doc = Document::new(master).with_file_name(file_name);
    for (name, value) in root {
        if let Some(tag) = decode_tag(&name, value) {
            doc = doc.with_tag(&name, tag);
        }
    }

    Ok(doc)
}

/// Decode one tag value. Returns `None` when the value is not tag-shaped
/// (not an object, or no `tasks` array).
///
/// Tasks decode one at a time: a task without a usable `id` is dropped with
/// a warning, and malformed fields inside a task fall back to defaults.
fn decode_tag(name: &str, value: Value) -> Option<Tag> {
    let Value::Object(mut fields) = value else {
        return None;
    };
    let Some(Value::Array(items)) = fields.remove("tasks") else {
        return None;
    };

    let mut tasks = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Task>(item) {
            Ok(task) => tasks.push(task),
            Err(e) => {
                tracing::warn!(tag = %name, index, error = %e, "skipping task without a usable id");
            }
        }
    }

    Some(Tag {
        tasks,
        metadata: decode_metadata(&mut fields),
    })
}

/// Metadata is informational only; anything malformed falls back to empty
fn decode_metadata(fields: &mut Map<String, Value>) -> TagMetadata {
    fields
        .remove("metadata")
        .and_then(|m| serde_json::from_value(m).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{Priority, Status, TaskId};
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
  "master": {
    "tasks": [
      {
        "id": 1,
        "title": "Set up repo",
        "description": "Init",
        "details": "",
        "testStrategy": "",
        "priority": "high",
        "status": "done",
        "dependencies": [],
        "subtasks": []
      },
      {
        "id": 2,
        "title": "Parser",
        "description": "Write the parser",
        "details": "d",
        "testStrategy": "t",
        "priority": "critical",
        "status": "pending",
        "dependencies": [1, "7"],
        "subtasks": [
          {"id": 1, "title": "Lexer", "description": "", "status": "done", "dependencies": []}
        ]
      }
    ],
    "metadata": {"created": "2025-01-01", "updated": "2025-01-02", "description": "Compiler"}
  },
  "feature-x": {"tasks": [], "metadata": {"created": "", "updated": "", "description": ""}},
  "settings": {"theme": "dark"},
  "version": 3
}"#;

    #[test]
    fn parses_master_and_extra_tags() {
        let doc = parse_document(SAMPLE).unwrap();
        assert_eq!(doc.tag_names(), vec!["master", "feature-x"]);
        let master = doc.master();
        assert_eq!(master.tasks.len(), 2);
        assert_eq!(master.metadata.description, "Compiler");
        let parser = &master.tasks[1];
        assert_eq!(parser.priority, Some(Priority::Critical));
        assert_eq!(parser.status, Status::Pending);
        assert_eq!(parser.dependencies, vec![TaskId::from(1), TaskId::from("7")]);
        assert_eq!(parser.subtasks[0].status, Status::Done);
    }

    #[test]
    fn missing_master_is_structural() {
        let err = parse_document(r#"{"feature": {"tasks": []}}"#).unwrap_err();
        assert!(matches!(err, DocumentError::MissingMaster));
    }

    #[test]
    fn master_without_tasks_array_is_structural() {
        for text in [
            r#"{"master": {}}"#,
            r#"{"master": {"tasks": {}}}"#,
            r#"{"master": []}"#,
            r#"[1, 2]"#,
        ] {
            let err = parse_document(text).unwrap_err();
            assert!(matches!(err, DocumentError::MissingMaster), "{}", text);
        }
    }

    #[test]
    fn empty_master_tasks_is_valid() {
        let doc = parse_document(r#"{"master": {"tasks": []}}"#).unwrap();
        assert!(doc.master().tasks.is_empty());
        assert_eq!(doc.master().metadata, TagMetadata::default());
    }

    #[test]
    fn malformed_text_is_syntax_error() {
        let err = parse_document(r#"{"master": {"tasks": ["#).unwrap_err();
        assert!(matches!(err, DocumentError::Syntax(_)));
    }

    #[test]
    fn task_without_id_is_dropped() {
        let doc = parse_document(
            r#"{"master": {"tasks": [{"id": 1, "title": "a"}, {"title": "draft"}, "junk", {"id": 2}]}}"#,
        )
        .unwrap();
        let ids: Vec<String> = doc.master().tasks.iter().map(|t| t.id.key()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(doc.master().tasks[0].title, "a");
    }

    #[test]
    fn wrong_typed_field_keeps_the_task() {
        let doc = parse_document(
            r#"{"master": {"tasks": [{"id": 1, "title": "a", "description": 42, "status": "done"}]}}"#,
        )
        .unwrap();
        let task = &doc.master().tasks[0];
        assert_eq!(task.title, "a");
        assert_eq!(task.description, "");
        assert_eq!(task.status, Status::Done);
    }

    #[test]
    fn bad_tasks_in_extra_tag_keep_the_tag() {
        let doc = parse_document(
            r#"{"master": {"tasks": []}, "broken": {"tasks": [{"id": true}]}, "ok": {"tasks": []}}"#,
        )
        .unwrap();
        assert_eq!(doc.tag_names(), vec!["master", "broken", "ok"]);
        assert!(doc.tag("broken").unwrap().tasks.is_empty());
    }

    #[test]
    fn file_name_is_picked_up() {
        let doc = parse_document(r#"{"master": {"tasks": []}, "fileName": "tasks.json"}"#).unwrap();
        assert_eq!(doc.file_name.as_deref(), Some("tasks.json"));
        assert_eq!(doc.tag_names(), vec!["master"]);
    }

    #[test]
    fn malformed_metadata_falls_back() {
        let doc = parse_document(r#"{"master": {"tasks": [], "metadata": "oops"}}"#).unwrap();
        assert_eq!(doc.master().metadata, TagMetadata::default());
    }
}
