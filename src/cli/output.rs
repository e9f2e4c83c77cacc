use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::io::store::ProjectSummary;
use crate::model::document::Tag;
use crate::model::task::{Status, Subtask, Task, TaskId};
use crate::ops::check::{CheckError, CheckResult, CheckWarning};
use crate::ops::graph::{self, Blocker, DepTree, DependencyEdge, DependencyMetrics};
use crate::ops::stats::TaskStats;
use crate::parse::{ParsedDetails, parse_embedded_log};
use crate::util::unicode::{display_width, fit_to_width, truncate_to_width};

/// Title column width in `td projects`
const NAME_COLUMN_MAX: usize = 32;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskRowJson<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    pub ready: bool,
    pub blocked: bool,
}

#[derive(Serialize)]
pub struct TaskDetailJson<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    pub ready: bool,
    pub blocked: bool,
    pub blocked_by: Vec<BlockerJson>,
    pub log: ParsedDetails,
}

#[derive(Serialize)]
pub struct SubtaskDetailJson<'a> {
    pub parent_id: &'a TaskId,
    #[serde(flatten)]
    pub subtask: &'a Subtask,
    pub ready: bool,
    pub blocked: bool,
    pub log: ParsedDetails,
}

#[derive(Serialize)]
pub struct BlockedJson<'a> {
    pub id: &'a TaskId,
    pub title: &'a str,
    pub status: &'a Status,
    pub blocked_by: Vec<BlockerJson>,
}

#[derive(Serialize)]
pub struct BlockerJson {
    pub id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub missing: bool,
}

#[derive(Serialize)]
pub struct StatsJson<'a> {
    pub tag: &'a str,
    #[serde(flatten)]
    pub stats: TaskStats,
    pub dependencies: Option<MetricsJson>,
    pub edges: Vec<DependencyEdge<'a>>,
}

#[derive(Serialize)]
pub struct MetricsJson {
    pub blocked: usize,
    pub ready: usize,
    pub average_dependencies: f64,
    pub bottleneck: Option<BottleneckJson>,
}

#[derive(Serialize)]
pub struct BottleneckJson {
    pub id: String,
    pub dependents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct DepTreeJson {
    pub id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub missing: bool,
    pub circular: bool,
    pub prerequisites: Vec<DepTreeJson>,
}

#[derive(Serialize)]
pub struct TagJson<'a> {
    pub name: &'a str,
    pub title: &'a str,
    pub tasks: usize,
    pub completion_percent: u32,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn blocker_to_json(blocker: &Blocker<'_>) -> BlockerJson {
    BlockerJson {
        id: blocker.id.clone(),
        title: blocker.task.map(|t| t.title.clone()),
        status: blocker.task.map(|t| t.status.clone()),
        missing: blocker.is_dangling(),
    }
}

pub fn metrics_to_json(metrics: &DependencyMetrics<'_>) -> MetricsJson {
    MetricsJson {
        blocked: metrics.blocked,
        ready: metrics.ready,
        average_dependencies: metrics.average_dependencies,
        bottleneck: metrics.bottleneck.as_ref().map(|b| BottleneckJson {
            id: b.id.clone(),
            dependents: b.dependents,
            title: b.task.map(|t| t.title.clone()),
        }),
    }
}

pub fn dep_tree_to_json(tree: &DepTree<'_>) -> DepTreeJson {
    DepTreeJson {
        id: tree.id.clone(),
        title: tree.task.map(|t| t.title.clone()),
        status: tree.task.map(|t| t.status.clone()),
        missing: tree.task.is_none(),
        circular: tree.circular,
        prerequisites: tree.prerequisites.iter().map(dep_tree_to_json).collect(),
    }
}

pub fn tag_to_json<'a>(name: &'a str, tag: &'a Tag) -> TagJson<'a> {
    TagJson {
        name,
        title: tag.title(),
        tasks: tag.tasks.len(),
        completion_percent: graph::aggregate_completion(&tag.tasks),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// One-line summary: `[c] ID Title`, with subtask progress when present
pub fn format_task_line(task: &Task) -> String {
    let progress = if task.subtasks.is_empty() {
        String::new()
    } else {
        let done = task.subtasks.iter().filter(|s| s.status.is_done()).count();
        format!(" ({}/{})", done, task.subtasks.len())
    };
    format!(
        "[{}] {} {}{}",
        task.status.status_char(),
        task.id,
        task.title,
        progress
    )
}

pub fn format_subtask_line(parent: &Task, subtask: &Subtask) -> String {
    format!(
        "[{}] {}.{} {}",
        subtask.status.status_char(),
        parent.id,
        subtask.id,
        subtask.title
    )
}

/// A task followed by its subtasks, indented
pub fn format_task_tree(task: &Task) -> Vec<String> {
    let mut lines = vec![format_task_line(task)];
    for sub in &task.subtasks {
        lines.push(format!("  {}", format_subtask_line(task, sub)));
    }
    lines
}

/// `[ ] 3 Title (blocked by: 1, 9 (not found))`
pub fn format_blocked_line(task: &Task, blockers: &[Blocker<'_>]) -> String {
    let ids: Vec<String> = blockers
        .iter()
        .map(|b| {
            if b.is_dangling() {
                format!("{} (not found)", b.id)
            } else {
                b.id.to_string()
            }
        })
        .collect();
    format!("{} (blocked by: {})", format_task_line(task), ids.join(", "))
}

fn push_block(lines: &mut Vec<String>, label: &str, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    lines.push(format!("{}:", label));
    for line in text.lines() {
        lines.push(format!("  {}", line));
    }
}

fn push_log(lines: &mut Vec<String>, parsed: &ParsedDetails) {
    if parsed.logs.is_empty() {
        return;
    }
    lines.push("log:".to_string());
    for entry in &parsed.logs {
        lines.push(format!("  {}", entry.date));
        for line in entry.content.trim().lines() {
            lines.push(format!("    {}", line));
        }
    }
}

/// Detailed view of a task
pub fn format_task_detail(task: &Task, all: &[Task]) -> Vec<String> {
    let mut lines = vec![format_task_line(task)];

    let mut status = format!("status: {}", task.status);
    if let Some(prev) = task.status_change() {
        status.push_str(&format!(" (was {})", prev));
    }
    lines.push(status);
    if let Some(priority) = &task.priority {
        lines.push(format!("priority: {}", priority));
    }
    if !task.dependencies.is_empty() {
        let deps: Vec<String> = task.dependencies.iter().map(|d| d.to_string()).collect();
        let state = if graph::is_blocked(task, all) {
            "blocked"
        } else {
            "satisfied"
        };
        lines.push(format!("depends on: {} ({})", deps.join(", "), state));
    }

    push_block(&mut lines, "description", &task.description);
    let parsed = parse_embedded_log(&task.details);
    push_block(&mut lines, "details", &parsed.main_text);
    push_log(&mut lines, &parsed);
    push_block(&mut lines, "test strategy", &task.test_strategy);
    if let Some(criteria) = &task.acceptance_criteria {
        push_block(&mut lines, "acceptance criteria", criteria);
    }

    if !task.subtasks.is_empty() {
        lines.push(String::new());
        lines.push("subtasks:".to_string());
        for sub in &task.subtasks {
            lines.push(format!("  {}", format_subtask_line(task, sub)));
        }
    }
    lines
}

/// Detailed view of a subtask
pub fn format_subtask_detail(parent: &Task, subtask: &Subtask, all: &[Task]) -> Vec<String> {
    let mut lines = vec![format_subtask_line(parent, subtask)];
    lines.push(format!("parent: {}", format_task_line(parent)));
    lines.push(format!("status: {}", subtask.status));
    if !subtask.dependencies.is_empty() {
        let deps: Vec<String> = subtask.dependencies.iter().map(|d| d.to_string()).collect();
        let state = if graph::is_subtask_blocked(parent, subtask, all) {
            "blocked"
        } else {
            "satisfied"
        };
        lines.push(format!("depends on: {} ({})", deps.join(", "), state));
    }
    if let Some(description) = &subtask.description {
        push_block(&mut lines, "description", description);
    }
    if let Some(details) = &subtask.details {
        let parsed = parse_embedded_log(details);
        push_block(&mut lines, "details", &parsed.main_text);
        push_log(&mut lines, &parsed);
    }
    if let Some(strategy) = &subtask.test_strategy {
        push_block(&mut lines, "test strategy", strategy);
    }
    lines
}

/// Prerequisite tree below the root task line
pub fn format_dep_tree(tree: &DepTree<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    match tree.task {
        Some(task) => lines.push(format_task_line(task)),
        None => lines.push(format!("{} (not found)", tree.id)),
    }
    if tree.task.is_some() && tree.prerequisites.is_empty() {
        lines.push("  (no dependencies)".to_string());
    }
    push_prerequisites(&mut lines, &tree.prerequisites, 1);
    lines
}

fn push_prerequisites(lines: &mut Vec<String>, nodes: &[DepTree<'_>], indent: usize) {
    let prefix = "  ".repeat(indent);
    for node in nodes {
        let line = match (node.task, node.circular) {
            (_, true) => format!("{}└─ {} (circular)", prefix, node.id),
            (None, false) => format!("{}└─ {} (not found)", prefix, node.id),
            (Some(task), false) => format!(
                "{}└─ [{}] {} {}",
                prefix,
                task.status.status_char(),
                task.id,
                task.title
            ),
        };
        lines.push(line);
        push_prerequisites(lines, &node.prerequisites, indent + 1);
    }
}

pub fn format_stats(stats: &TaskStats, metrics: Option<&DependencyMetrics<'_>>) -> Vec<String> {
    let mut lines = vec![
        format!(
            "tasks: {} total, {} done, {} in progress, {} pending",
            stats.total, stats.completed, stats.in_progress, stats.pending
        ),
        format!("high priority: {}", stats.high_priority),
        format!("completion: {}%", stats.completion_percent),
    ];
    if let Some(m) = metrics {
        lines.push(format!(
            "ready: {}  blocked: {}  avg deps: {:.1}",
            m.ready, m.blocked, m.average_dependencies
        ));
        if let Some(b) = &m.bottleneck {
            let title = b.task.map(|t| t.title.as_str()).unwrap_or("(not found)");
            let noun = if b.dependents == 1 { "dependent" } else { "dependents" };
            lines.push(format!(
                "bottleneck: {} {} ({} {})",
                b.id, title, b.dependents, noun
            ));
        }
    }
    lines
}

pub fn format_check(result: &CheckResult) -> Vec<String> {
    let mut lines = Vec::new();
    if !result.errors.is_empty() {
        lines.push("Errors:".to_string());
        for err in &result.errors {
            lines.push(match err {
                CheckError::DanglingDep {
                    tag,
                    task_id,
                    dep_id,
                } => format!("  [{}] {} has dangling dep: {}", tag, task_id, dep_id),
                CheckError::SelfDep { tag, task_id } => {
                    format!("  [{}] {} depends on itself", tag, task_id)
                }
                CheckError::DuplicateId {
                    tag,
                    task_id,
                    count,
                } => format!("  [{}] {} appears {} times", tag, task_id, count),
            });
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            lines.push(String::new());
        }
        lines.push("Warnings:".to_string());
        for warn in &result.warnings {
            lines.push(match warn {
                CheckWarning::DanglingSubtaskDep {
                    tag,
                    task_id,
                    subtask_id,
                    dep_id,
                } => format!(
                    "  [{}] {}.{} has dangling dep: {}",
                    tag, task_id, subtask_id, dep_id
                ),
                CheckWarning::EmptyMaster => "  master tag has no tasks".to_string(),
            });
        }
    }
    if result.valid {
        lines.push("✓ document is valid".to_string());
    } else {
        lines.push("✗ document has errors".to_string());
    }
    lines
}

pub fn format_tag_line(name: &str, tag: &Tag) -> String {
    format!(
        "  {} ({}) {} tasks, {}%",
        name,
        tag.title(),
        tag.tasks.len(),
        graph::aggregate_completion(&tag.tasks)
    )
}

/// Aligned project listing, most recent first
pub fn format_project_lines(projects: &[ProjectSummary]) -> Vec<String> {
    let names: Vec<String> = projects
        .iter()
        .map(|p| truncate_to_width(&project_label(p), NAME_COLUMN_MAX))
        .collect();
    let width = names.iter().map(|n| display_width(n)).max().unwrap_or(0).max(4);

    projects
        .iter()
        .zip(&names)
        .map(|(p, name)| {
            let marker = if p.last { '*' } else { ' ' };
            format!(
                "{} {}  {:>4} tasks  {:<12}  {}",
                marker,
                fit_to_width(name, width),
                p.tasks,
                relative_time(&p.saved_at),
                abbreviate_path(&p.path)
            )
        })
        .collect()
}

fn project_label(p: &ProjectSummary) -> String {
    let parent = std::path::Path::new(&p.path)
        .parent()
        .and_then(|d| d.parent())
        .and_then(|d| d.parent())
        .and_then(|d| d.file_name())
        .map(|n| n.to_string_lossy().to_string());
    match (parent, &p.file_name) {
        (Some(project), _) if p.path.ends_with(crate::io::project_io::TASKS_FILE) => project,
        (_, Some(name)) => name.clone(),
        _ => p.key.clone(),
    }
}

/// Abbreviate a path by replacing $HOME with ~
pub fn abbreviate_path(path: &str) -> String {
    if let Ok(home) = std::env::var("HOME")
        && !home.is_empty()
        && let Some(rest) = path.strip_prefix(&home)
    {
        return format!("~{}", rest);
    }
    path.to_string()
}

/// Format a relative time string like "2 min ago", "yesterday", "3 days ago"
pub fn relative_time(dt: &DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(*dt);
    match elapsed.num_minutes() {
        m if m < 1 => "just now".to_string(),
        m if m < 60 => format!("{} min ago", m),
        _ => match elapsed.num_hours() {
            h if h < 24 => format!("{} hr ago", h),
            _ => match elapsed.num_days() {
                1 => "yesterday".to_string(),
                d if d < 7 => format!("{} days ago", d),
                d if d < 35 => format!("{} weeks ago", d / 7),
                d => format!("{} months ago", d / 30),
            },
        },
    }
}
