//! Dependency and readiness analysis over a slice of tasks.
//!
//! Every function here is pure and total: dangling dependency ids, empty
//! slices, self references and cycles are ordinary inputs. A dependency that
//! does not resolve is treated as unsatisfied, so unknown prerequisites never
//! unblock work.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::task::{Status, Subtask, Task, TaskId, priority_weight};

/// Find the first task with the given id
pub fn find_task<'a>(tasks: &'a [Task], id: &TaskId) -> Option<&'a Task> {
    tasks.iter().find(|t| t.id == *id)
}

fn is_satisfied(dep: &TaskId, all: &[Task]) -> bool {
    find_task(all, dep).is_some_and(|t| t.status.is_done())
}

/// Not done, and at least one dependency is unresolved or not done
pub fn is_blocked(task: &Task, all: &[Task]) -> bool {
    !task.status.is_done() && task.dependencies.iter().any(|d| !is_satisfied(d, all))
}

/// Not done, and every dependency resolves to a done task
pub fn is_ready(task: &Task, all: &[Task]) -> bool {
    !task.status.is_done() && task.dependencies.iter().all(|d| is_satisfied(d, all))
}

/// An unsatisfied dependency of a task
#[derive(Debug, Clone)]
pub struct Blocker<'a> {
    pub id: TaskId,
    /// The prerequisite, or `None` when the id dangles
    pub task: Option<&'a Task>,
}

impl Blocker<'_> {
    pub fn is_dangling(&self) -> bool {
        self.task.is_none()
    }
}

/// All dependencies of `task` that are not satisfied, in declaration order
pub fn blockers<'a>(task: &Task, all: &'a [Task]) -> Vec<Blocker<'a>> {
    task.dependencies
        .iter()
        .filter_map(|dep| {
            let found = find_task(all, dep);
            match found {
                Some(t) if t.status.is_done() => None,
                _ => Some(Blocker {
                    id: dep.clone(),
                    task: found,
                }),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Subtasks
// ---------------------------------------------------------------------------

/// What a subtask dependency resolved to
#[derive(Debug, Clone, Copy)]
pub enum DependencyTarget<'a> {
    Task(&'a Task),
    Subtask {
        parent: &'a Task,
        subtask: &'a Subtask,
    },
}

impl DependencyTarget<'_> {
    pub fn status(&self) -> &Status {
        match self {
            DependencyTarget::Task(t) => &t.status,
            DependencyTarget::Subtask { subtask, .. } => &subtask.status,
        }
    }
}

/// Resolve a subtask dependency.
///
/// A dotted reference `P.S` names subtask `S` of task `P`. A plain id names a
/// sibling subtask under the same parent, falling back to a top-level task.
pub fn resolve_subtask_dependency<'a>(
    parent: &'a Task,
    dep: &TaskId,
    all: &'a [Task],
) -> Option<DependencyTarget<'a>> {
    let key = dep.key();
    if let Some((parent_key, sub_key)) = key.split_once('.') {
        let owner = all.iter().find(|t| t.id.key() == parent_key)?;
        return owner
            .subtasks
            .iter()
            .find(|s| s.id.key() == sub_key)
            .map(|subtask| DependencyTarget::Subtask {
                parent: owner,
                subtask,
            });
    }
    if let Some(subtask) = parent.subtasks.iter().find(|s| s.id == *dep) {
        return Some(DependencyTarget::Subtask { parent, subtask });
    }
    find_task(all, dep).map(DependencyTarget::Task)
}

fn subtask_dep_satisfied(parent: &Task, dep: &TaskId, all: &[Task]) -> bool {
    resolve_subtask_dependency(parent, dep, all).is_some_and(|t| t.status().is_done())
}

pub fn is_subtask_blocked(parent: &Task, subtask: &Subtask, all: &[Task]) -> bool {
    !subtask.status.is_done()
        && subtask
            .dependencies
            .iter()
            .any(|d| !subtask_dep_satisfied(parent, d, all))
}

pub fn is_subtask_ready(parent: &Task, subtask: &Subtask, all: &[Task]) -> bool {
    !subtask.status.is_done()
        && subtask
            .dependencies
            .iter()
            .all(|d| subtask_dep_satisfied(parent, d, all))
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Fraction of a task that is complete, in `[0, 1]`.
///
/// A task with subtasks is scored only by its subtasks; its own status is
/// ignored.
pub fn completion_ratio(task: &Task) -> f64 {
    if task.subtasks.is_empty() {
        return if task.status.is_done() { 1.0 } else { 0.0 };
    }
    let done = task.subtasks.iter().filter(|s| s.status.is_done()).count();
    done as f64 / task.subtasks.len() as f64
}

/// Mean completion over all tasks as a whole percentage; 0 for no tasks
pub fn aggregate_completion(tasks: &[Task]) -> u32 {
    if tasks.is_empty() {
        return 0;
    }
    let total: f64 = tasks.iter().map(|t| completion_ratio(t) * 100.0).sum();
    (total / tasks.len() as f64).round().clamp(0.0, 100.0) as u32
}

// ---------------------------------------------------------------------------
// Bottlenecks
// ---------------------------------------------------------------------------

/// Number of dependency edges pointing at each prerequisite id, in the order
/// the ids were first encountered
pub fn dependency_fan_in(tasks: &[Task]) -> IndexMap<String, usize> {
    let mut counts = IndexMap::new();
    for task in tasks {
        for dep in &task.dependencies {
            *counts.entry(dep.key()).or_insert(0) += 1;
        }
    }
    counts
}

/// The most depended-on prerequisite
#[derive(Debug, Clone)]
pub struct Bottleneck<'a> {
    pub id: String,
    pub dependents: usize,
    /// `None` when the id does not resolve to a task in the slice
    pub task: Option<&'a Task>,
}

/// The prerequisite with the highest fan-in. Ties go to the first id
/// encountered; no dependency edges at all yields `None`.
pub fn bottleneck(tasks: &[Task]) -> Option<Bottleneck<'_>> {
    let fan_in = dependency_fan_in(tasks);
    let mut best: Option<(&String, usize)> = None;
    for (id, &count) in &fan_in {
        if best.is_none_or(|(_, max)| count > max) {
            best = Some((id, count));
        }
    }
    best.map(|(id, dependents)| Bottleneck {
        id: id.clone(),
        dependents,
        task: tasks.iter().find(|t| t.id.key() == *id),
    })
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// The task to work on next.
///
/// Candidates are `pending` and `in-progress` tasks, ranked unblocked first,
/// then by priority weight (highest first), then by id ascending.
pub fn recommend_next(tasks: &[Task]) -> Option<&Task> {
    let mut candidates: Vec<(&Task, bool)> = tasks
        .iter()
        .filter(|t| matches!(t.status, Status::Pending | Status::InProgress))
        .map(|t| (t, is_blocked(t, tasks)))
        .collect();

    candidates.sort_by(|(a, a_blocked), (b, b_blocked)| {
        a_blocked
            .cmp(b_blocked)
            .then_with(|| {
                priority_weight(b.priority.as_ref()).cmp(&priority_weight(a.priority.as_ref()))
            })
            .then_with(|| a.id.cmp_natural(&b.id))
    });

    candidates.first().map(|(task, _)| *task)
}

// ---------------------------------------------------------------------------
// Metrics and edges
// ---------------------------------------------------------------------------

/// Aggregate dependency health for a set of tasks
#[derive(Debug, Clone)]
pub struct DependencyMetrics<'a> {
    pub blocked: usize,
    pub ready: usize,
    pub average_dependencies: f64,
    pub bottleneck: Option<Bottleneck<'a>>,
}

/// Blocked/ready counts, mean dependency count and bottleneck.
/// Returns `None` for an empty slice.
pub fn dependency_metrics(tasks: &[Task]) -> Option<DependencyMetrics<'_>> {
    if tasks.is_empty() {
        return None;
    }
    let edges: usize = tasks.iter().map(|t| t.dependencies.len()).sum();
    Some(DependencyMetrics {
        blocked: tasks.iter().filter(|t| is_blocked(t, tasks)).count(),
        ready: tasks.iter().filter(|t| is_ready(t, tasks)).count(),
        average_dependencies: edges as f64 / tasks.len() as f64,
        bottleneck: bottleneck(tasks),
    })
}

/// A dependency edge between two tasks that both exist in the slice
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DependencyEdge<'a> {
    #[serde(rename = "source", serialize_with = "serialize_task_id")]
    pub dependent: &'a Task,
    #[serde(rename = "target", serialize_with = "serialize_task_id")]
    pub prerequisite: &'a Task,
}

fn serialize_task_id<S: serde::Serializer>(task: &&Task, s: S) -> Result<S::Ok, S::Error> {
    task.id.serialize(s)
}

/// Edges whose prerequisite resolves; dangling ids are dropped
pub fn dependency_edges(tasks: &[Task]) -> Vec<DependencyEdge<'_>> {
    tasks
        .iter()
        .flat_map(|task| {
            task.dependencies.iter().filter_map(move |dep| {
                find_task(tasks, dep).map(|prerequisite| DependencyEdge {
                    dependent: task,
                    prerequisite,
                })
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dependency tree
// ---------------------------------------------------------------------------

/// A node in a task's prerequisite tree
#[derive(Debug, Clone)]
pub struct DepTree<'a> {
    pub id: TaskId,
    /// `None` when the id dangles
    pub task: Option<&'a Task>,
    /// The id already appears on the path from the root; not expanded
    pub circular: bool,
    pub prerequisites: Vec<DepTree<'a>>,
}

/// Build the prerequisite tree rooted at `id`.
/// Expansion stops at ids already on the current path, so cycles terminate.
pub fn dependency_tree<'a>(id: &TaskId, tasks: &'a [Task]) -> DepTree<'a> {
    let mut path = HashSet::new();
    build_tree(id, tasks, &mut path)
}

fn build_tree<'a>(id: &TaskId, tasks: &'a [Task], path: &mut HashSet<String>) -> DepTree<'a> {
    let task = find_task(tasks, id);
    if !path.insert(id.key()) {
        return DepTree {
            id: id.clone(),
            task,
            circular: true,
            prerequisites: Vec::new(),
        };
    }
    let prerequisites: Vec<DepTree<'a>> = task
        .map(|t| {
            t.dependencies
                .iter()
                .map(|dep| build_tree(dep, tasks, path))
                .collect()
        })
        .unwrap_or_default();
    path.remove(&id.key());
    DepTree {
        id: id.clone(),
        task,
        circular: false,
        prerequisites,
    }
}
