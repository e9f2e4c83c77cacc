use regex::Regex;

use crate::model::task::{Priority, Status, Task};

/// Dashboard filter state. Empty lists and `None` mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub statuses: Vec<Status>,
    pub priorities: Vec<Priority>,
    pub search: Option<String>,
    /// `Some(true)`: only tasks with subtasks; `Some(false)`: only tasks without
    pub has_subtasks: Option<bool>,
}

impl TaskFilter {
    /// Case-insensitive regex for the search query. A query that is not a
    /// valid pattern is matched literally. Blank queries match everything.
    pub fn search_re(&self) -> Option<Regex> {
        let query = self.search.as_deref().map(str::trim).filter(|q| !q.is_empty())?;
        Regex::new(&format!("(?i){}", query))
            .or_else(|_| Regex::new(&format!("(?i){}", regex::escape(query))))
            .ok()
    }

    fn matches_with(&self, task: &Task, re: Option<&Regex>) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if !self.priorities.is_empty()
            && !task
                .priority
                .as_ref()
                .is_some_and(|p| self.priorities.contains(p))
        {
            return false;
        }
        if let Some(re) = re
            && !(re.is_match(&task.title) || re.is_match(&task.description))
        {
            return false;
        }
        if let Some(want) = self.has_subtasks
            && want == task.subtasks.is_empty()
        {
            return false;
        }
        true
    }

    /// The tasks passing every constraint, in input order
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        let re = self.search_re();
        tasks
            .iter()
            .filter(|t| self.matches_with(t, re.as_ref()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::Subtask;

    fn sample() -> Vec<Task> {
        let mut api = Task::new(1, "Build API", Status::Pending).with_priority(Priority::High);
        api.description = "REST endpoints".into();
        let ui = Task::new(2, "Dashboard UI", Status::InProgress)
            .with_priority(Priority::Low)
            .with_subtasks(vec![Subtask::new(1, "Layout", Status::Done)]);
        let docs = Task::new(3, "Write docs (v2)", Status::Done);
        vec![api, ui, docs]
    }

    fn ids(tasks: &[Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.key()).collect()
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = TaskFilter::default();
        assert_eq!(filter.apply(&sample()).len(), 3);
    }

    #[test]
    fn status_and_priority() {
        let filter = TaskFilter {
            statuses: vec![Status::Pending, Status::InProgress],
            priorities: vec![Priority::High],
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&sample())), vec!["1"]);
    }

    #[test]
    fn missing_priority_fails_priority_filter() {
        let filter = TaskFilter {
            priorities: vec![Priority::Medium, Priority::High],
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&sample())), vec!["1"]);
    }

    #[test]
    fn search_title_and_description_case_insensitive() {
        let filter = TaskFilter {
            search: Some("rest".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&sample())), vec!["1"]);
        let filter = TaskFilter {
            search: Some("DASH".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&sample())), vec!["2"]);
    }

    #[test]
    fn invalid_regex_matches_literally() {
        let filter = TaskFilter {
            search: Some("(v2".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&sample())), vec!["3"]);
    }

    #[test]
    fn blank_search_is_ignored() {
        let filter = TaskFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert!(filter.search_re().is_none());
        assert_eq!(filter.apply(&sample()).len(), 3);
    }

    #[test]
    fn subtask_presence() {
        let with = TaskFilter {
            has_subtasks: Some(true),
            ..Default::default()
        };
        assert_eq!(ids(&with.apply(&sample())), vec!["2"]);
        let without = TaskFilter {
            has_subtasks: Some(false),
            ..Default::default()
        };
        assert_eq!(ids(&without.apply(&sample())), vec!["1", "3"]);
    }
}
