use std::collections::HashMap;

use serde::Serialize;

use crate::model::document::Document;
use crate::model::task::Task;
use crate::ops::graph::{find_task, resolve_subtask_dependency};

/// Structured result from `td check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A validation error (something that should be fixed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// A dependency references a task ID that doesn't exist in the tag
    #[serde(rename = "dangling_dep")]
    DanglingDep {
        tag: String,
        task_id: String,
        dep_id: String,
    },
    /// A task lists itself as a dependency
    #[serde(rename = "self_dep")]
    SelfDep { tag: String, task_id: String },
    /// Duplicate task ID within a tag
    #[serde(rename = "duplicate_id")]
    DuplicateId {
        tag: String,
        task_id: String,
        count: usize,
    },
}

/// A validation warning (non-critical issue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// A subtask dependency resolves to nothing
    #[serde(rename = "dangling_subtask_dep")]
    DanglingSubtaskDep {
        tag: String,
        task_id: String,
        subtask_id: String,
        dep_id: String,
    },
    /// The master tag holds no tasks
    #[serde(rename = "empty_master")]
    EmptyMaster,
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a document and return structured results.
///
/// This is a read-only operation. Dependencies resolve within their own tag.
///
/// Checks performed:
/// 1. All task dependencies resolve to existing task IDs
/// 2. No task depends on itself
/// 3. No duplicate task IDs within a tag
/// 4. Warnings for unresolved subtask dependencies and an empty master tag
pub fn check_document(doc: &Document) -> CheckResult {
    let mut result = CheckResult::default();

    if doc.master().tasks.is_empty() {
        result.warnings.push(CheckWarning::EmptyMaster);
    }

    for (tag, t) in doc.tags() {
        check_duplicates(tag, &t.tasks, &mut result);
        for task in &t.tasks {
            check_task(tag, task, &t.tasks, &mut result);
        }
    }

    result.valid = result.errors.is_empty();
    result
}

fn check_duplicates(tag: &str, tasks: &[Task], result: &mut CheckResult) {
    let mut seen: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for task in tasks {
        let key = task.id.key();
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            seen.push(key);
        }
        *count += 1;
    }
    for key in seen {
        let count = counts[&key];
        if count > 1 {
            result.errors.push(CheckError::DuplicateId {
                tag: tag.to_string(),
                task_id: key,
                count,
            });
        }
    }
}

fn check_task(tag: &str, task: &Task, all: &[Task], result: &mut CheckResult) {
    let task_id = task.id.key();

    for dep in &task.dependencies {
        if *dep == task.id {
            result.errors.push(CheckError::SelfDep {
                tag: tag.to_string(),
                task_id: task_id.clone(),
            });
        } else if find_task(all, dep).is_none() {
            result.errors.push(CheckError::DanglingDep {
                tag: tag.to_string(),
                task_id: task_id.clone(),
                dep_id: dep.key(),
            });
        }
    }

    for subtask in &task.subtasks {
        for dep in &subtask.dependencies {
            if resolve_subtask_dependency(task, dep, all).is_none() {
                result.warnings.push(CheckWarning::DanglingSubtaskDep {
                    tag: tag.to_string(),
                    task_id: task_id.clone(),
                    subtask_id: subtask.id.key(),
                    dep_id: dep.key(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_document_is_valid() {
        let doc = parse_document(
            r#"{"master": {"tasks": [
                {"id": 1, "status": "done"},
                {"id": 2, "status": "pending", "dependencies": [1],
                 "subtasks": [{"id": 1, "status": "pending"}, {"id": 2, "status": "pending", "dependencies": [1]}]}
            ]}}"#,
        )
        .unwrap();
        let result = check_document(&doc);
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn reports_dangling_self_and_duplicates() {
        let doc = parse_document(
            r#"{"master": {"tasks": [
                {"id": 1, "dependencies": [1, 9]},
                {"id": "1"},
                {"id": 2, "subtasks": [{"id": 1, "dependencies": ["7.1"]}]}
            ]}, "side": {"tasks": [{"id": 5, "dependencies": [2]}]}}"#,
        )
        .unwrap();
        let result = check_document(&doc);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![
                CheckError::DuplicateId {
                    tag: "master".into(),
                    task_id: "1".into(),
                    count: 2
                },
                CheckError::SelfDep {
                    tag: "master".into(),
                    task_id: "1".into()
                },
                CheckError::DanglingDep {
                    tag: "master".into(),
                    task_id: "1".into(),
                    dep_id: "9".into()
                },
                CheckError::DanglingDep {
                    tag: "side".into(),
                    task_id: "5".into(),
                    dep_id: "2".into()
                },
            ]
        );
        assert_eq!(
            result.warnings,
            vec![CheckWarning::DanglingSubtaskDep {
                tag: "master".into(),
                task_id: "2".into(),
                subtask_id: "1".into(),
                dep_id: "7.1".into()
            }]
        );
    }

    #[test]
    fn empty_master_warns() {
        let doc = parse_document(r#"{"master": {"tasks": []}}"#).unwrap();
        let result = check_document(&doc);
        assert!(result.valid);
        assert_eq!(result.warnings, vec![CheckWarning::EmptyMaster]);
    }

    #[test]
    fn json_shape() {
        let doc = parse_document(r#"{"master": {"tasks": [{"id": 1, "dependencies": [3]}]}}"#).unwrap();
        let json = serde_json::to_value(check_document(&doc)).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"][0]["type"], "dangling_dep");
        assert_eq!(json["errors"][0]["dep_id"], "3");
    }
}
