use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Task identifier as it appears in the JSON document: either a number or a string.
///
/// Equality and hashing use the string-normalized form, so `1` and `"1"`
/// name the same task. The representation as written is kept for output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Number(serde_json::Number),
    Text(String),
}

impl TaskId {
    /// The string-normalized form used for lookups
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Numeric value of the id, if it parses as a finite number
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            TaskId::Number(n) => n.as_f64(),
            TaskId::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value.filter(|n| n.is_finite())
    }

    /// Ordering used when ranking tasks: numeric ids compare numerically and
    /// come before non-numeric ids, which compare lexically.
    pub fn cmp_natural(&self, other: &TaskId) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.total_cmp(&b).then_with(|| self.key().cmp(&other.key())),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.key().cmp(&other.key()),
        }
    }
}

/// Largest float that still holds every integer exactly
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

impl fmt::Display for TaskId {
    /// Integral floats print without a fraction, so `1.0` and `1` agree
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Number(n) if n.is_f64() => match n.as_f64() {
                Some(v) if v.fract() == 0.0 && v.abs() <= MAX_EXACT_FLOAT => {
                    write!(f, "{}", v as i64)
                }
                _ => write!(f, "{}", n),
            },
            TaskId::Number(n) => write!(f, "{}", n),
            TaskId::Text(s) => f.write_str(s),
        }
    }
}

impl PartialEq for TaskId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TaskId::Text(a), TaskId::Text(b)) => a == b,
            _ => self.key() == other.key(),
        }
    }
}

impl Eq for TaskId {}

impl Hash for TaskId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId::Text(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId::Text(s)
    }
}

impl From<u64> for TaskId {
    fn from(n: u64) -> Self {
        TaskId::Number(n.into())
    }
}

impl From<i32> for TaskId {
    fn from(n: i32) -> Self {
        TaskId::Number(n.into())
    }
}

/// Task status. Unknown strings are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Done,
    Cancelled,
    Deferred,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Done => "done",
            Status::Cancelled => "cancelled",
            Status::Deferred => "deferred",
            Status::Other(s) => s,
        }
    }

    /// Only `done` satisfies a dependency or counts toward completion
    pub fn is_done(&self) -> bool {
        matches!(self, Status::Done)
    }

    /// Single-character marker used in list output
    pub fn status_char(&self) -> char {
        match self {
            Status::Pending => ' ',
            Status::InProgress => '>',
            Status::Done => 'x',
            Status::Cancelled => '-',
            Status::Deferred => '~',
            Status::Other(_) => '?',
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Status::Pending,
            "in-progress" => Status::InProgress,
            "done" => Status::Done,
            "cancelled" => Status::Cancelled,
            "deferred" => Status::Deferred,
            _ => Status::Other(s),
        }
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        Status::from(s.to_string())
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        match s {
            Status::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority. Unknown strings are kept verbatim in `Other` and weigh 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
    Other(String),
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
            Priority::Other(s) => s,
        }
    }

    /// Ranking weight: critical=4, high=3, medium=2, low=1, anything else 0
    pub fn weight(&self) -> u8 {
        match self {
            Priority::Critical => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
            Priority::Other(_) => 0,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Priority::High | Priority::Critical)
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        match s.as_str() {
            "low" => Priority::Low,
            "medium" => Priority::Medium,
            "high" => Priority::High,
            "critical" => Priority::Critical,
            _ => Priority::Other(s),
        }
    }
}

impl From<&str> for Priority {
    fn from(s: &str) -> Self {
        Priority::from(s.to_string())
    }
}

impl From<Priority> for String {
    fn from(p: Priority) -> Self {
        match p {
            Priority::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight of an optional priority; a missing priority weighs 0
pub fn priority_weight(priority: Option<&Priority>) -> u8 {
    priority.map_or(0, Priority::weight)
}

/// A top-level task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub description: String,
    /// Free text; may embed `<info added on T>` log blocks
    #[serde(default, deserialize_with = "lenient")]
    pub details: String,
    #[serde(default, deserialize_with = "lenient")]
    pub test_strategy: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Status,
    /// Prerequisite ids; may dangle
    #[serde(default, deserialize_with = "lenient_items")]
    pub dependencies: Vec<TaskId>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub subtasks: Vec<Subtask>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<Status>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
}

impl Task {
    /// Create a task with the given fields and everything else empty
    pub fn new(id: impl Into<TaskId>, title: &str, status: Status) -> Self {
        Task {
            id: id.into(),
            title: title.to_string(),
            description: String::new(),
            details: String::new(),
            test_strategy: String::new(),
            priority: None,
            status,
            dependencies: Vec::new(),
            subtasks: Vec::new(),
            previous_status: None,
            acceptance_criteria: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_dependencies<I, D>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<TaskId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subtasks(mut self, subtasks: Vec<Subtask>) -> Self {
        self.subtasks = subtasks;
        self
    }

    /// The previous status, if it differs from the current one
    pub fn status_change(&self) -> Option<&Status> {
        self.previous_status
            .as_ref()
            .filter(|prev| **prev != self.status)
    }
}

/// A subtask. Its id is unique only within its parent task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: TaskId,
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub test_strategy: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Status,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Sibling subtask ids, or dotted `parent.subtask` references
    #[serde(default, deserialize_with = "lenient_items")]
    pub dependencies: Vec<TaskId>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
}

impl Subtask {
    pub fn new(id: impl Into<TaskId>, title: &str, status: Status) -> Self {
        Subtask {
            id: id.into(),
            title: title.to_string(),
            description: None,
            details: None,
            test_strategy: None,
            status,
            priority: None,
            dependencies: Vec::new(),
            acceptance_criteria: None,
            parent_task_id: None,
        }
    }

    pub fn with_dependencies<I, D>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<TaskId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// Decode a field, treating `null` or a value of the wrong type like a
/// missing field
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Decode an array element by element, dropping elements that don't decode.
/// Anything other than an array decodes as empty.
fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numeric_and_string_ids_are_equal() {
        let n: TaskId = serde_json::from_str("12").unwrap();
        let s: TaskId = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(n, s);
        assert_eq!(n.key(), "12");
        assert!(matches!(n, TaskId::Number(_)));
        assert!(matches!(s, TaskId::Text(_)));
    }

    #[test]
    fn ids_keep_their_json_shape() {
        let n: TaskId = serde_json::from_str("7").unwrap();
        assert_eq!(serde_json::to_string(&n).unwrap(), "7");
        let s: TaskId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"7\"");
    }

    #[test]
    fn natural_ordering() {
        let two = TaskId::from(2);
        let ten = TaskId::from("10");
        let alpha = TaskId::from("alpha");
        let beta = TaskId::from("beta");
        assert_eq!(two.cmp_natural(&ten), Ordering::Less);
        assert_eq!(ten.cmp_natural(&alpha), Ordering::Less);
        assert_eq!(beta.cmp_natural(&alpha), Ordering::Greater);
        assert!(TaskId::from("nan").as_number().is_none());
    }

    #[test]
    fn unknown_status_is_preserved() {
        let s: Status = serde_json::from_str("\"review\"").unwrap();
        assert_eq!(s, Status::Other("review".into()));
        assert!(!s.is_done());
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"review\"");
        let done: Status = serde_json::from_str("\"done\"").unwrap();
        assert!(done.is_done());
    }

    #[test]
    fn priority_weights() {
        assert_eq!(Priority::Critical.weight(), 4);
        assert_eq!(Priority::Low.weight(), 1);
        assert_eq!(Priority::from("urgent").weight(), 0);
        assert_eq!(priority_weight(None), 0);
        assert!(Priority::High.is_high());
        assert!(!Priority::Medium.is_high());
    }

    #[test]
    fn lenient_task_parse() {
        let task: Task = serde_json::from_str(
            r#"{"id": 3, "title": "Wire it up", "status": "in-progress", "dependencies": null}"#,
        )
        .unwrap();
        assert_eq!(task.id, TaskId::from(3));
        assert_eq!(task.status, Status::InProgress);
        assert!(task.dependencies.is_empty());
        assert!(task.subtasks.is_empty());
        assert_eq!(task.details, "");
        assert!(task.priority.is_none());
    }

    #[test]
    fn wrong_typed_fields_fall_back_to_defaults() {
        let task: Task = serde_json::from_str(
            r#"{"id": 1, "title": ["x"], "description": 42, "status": 3, "priority": 5,
                "dependencies": [2, true, "3", {"id": 4}],
                "subtasks": [{"title": "no id"}, {"id": 2, "description": false}],
                "acceptanceCriteria": 7}"#,
        )
        .unwrap();
        assert_eq!(task.title, "");
        assert_eq!(task.description, "");
        assert_eq!(task.status, Status::Pending);
        assert!(task.priority.is_none());
        assert_eq!(task.dependencies, vec![TaskId::from(2), TaskId::from("3")]);
        assert_eq!(task.subtasks.len(), 1);
        assert_eq!(task.subtasks[0].id, TaskId::from(2));
        assert!(task.subtasks[0].description.is_none());
        assert!(task.acceptance_criteria.is_none());
    }

    #[test]
    fn task_without_id_does_not_decode() {
        assert!(serde_json::from_str::<Task>(r#"{"title": "draft"}"#).is_err());
        assert!(serde_json::from_str::<Task>(r#"{"id": null, "title": "draft"}"#).is_err());
    }

    #[test]
    fn integral_float_ids_normalize() {
        let float: TaskId = serde_json::from_str("1.0").unwrap();
        assert_eq!(float.key(), "1");
        assert_eq!(float, TaskId::from(1));
        assert_eq!(float, TaskId::from("1"));
        // the written form survives serialization
        assert_eq!(serde_json::to_string(&float).unwrap(), "1.0");

        let fraction: TaskId = serde_json::from_str("1.5").unwrap();
        assert_eq!(fraction.key(), "1.5");
        assert_ne!(TaskId::from("1.0"), TaskId::from(1));
    }

    #[test]
    fn camel_case_fields() {
        let task: Task = serde_json::from_str(
            r#"{"id": "1", "testStrategy": "unit", "previousStatus": "pending",
                "acceptanceCriteria": "works", "status": "done",
                "subtasks": [{"id": 1, "title": "a", "status": "done", "parentTaskId": "1"}]}"#,
        )
        .unwrap();
        assert_eq!(task.test_strategy, "unit");
        assert_eq!(task.status_change(), Some(&Status::Pending));
        assert_eq!(task.acceptance_criteria.as_deref(), Some("works"));
        assert_eq!(task.subtasks[0].parent_task_id, Some(TaskId::from("1")));
    }
}
