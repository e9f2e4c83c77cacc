use serde::Serialize;

use crate::model::task::{Status, Task};
use crate::ops::graph::aggregate_completion;

/// Summary counts for a set of tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    /// Tasks at `high` or `critical` priority
    pub high_priority: usize,
    /// Aggregate completion percentage (subtask-aware)
    pub completion_percent: u32,
}

pub fn task_stats(tasks: &[Task]) -> TaskStats {
    let mut stats = TaskStats {
        total: tasks.len(),
        completion_percent: aggregate_completion(tasks),
        ..Default::default()
    };
    for task in tasks {
        match task.status {
            Status::Done => stats.completed += 1,
            Status::InProgress => stats.in_progress += 1,
            Status::Pending => stats.pending += 1,
            _ => {}
        }
        if task.priority.as_ref().is_some_and(|p| p.is_high()) {
            stats.high_priority += 1;
        }
    }
    stats
}
