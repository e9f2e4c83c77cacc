mod watch;
pub use watch::cmd_watch;

use std::error::Error;
use std::path::{Path, PathBuf};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::project_io::{self, ProjectError};
use crate::io::source::{FileSource, LocalFileSource};
use crate::io::store::{self, JsonSnapshotStore, SnapshotStore};
use crate::model::config::DeckConfig;
use crate::model::document::Document;
use crate::model::task::{Priority, Status, Task, TaskId};
use crate::ops::filter::TaskFilter;
use crate::ops::{check, graph, stats};
use crate::parse::parse_embedded_log;

type CmdResult = Result<(), Box<dyn Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let config = match &cli.config {
        Some(path) => config_io::read_config_from(path)?,
        None => config_io::read_config()?,
    };
    let ctx = Context::new(&cli, config);

    match cli.command {
        // Store only; no document needed
        Commands::Projects => cmd_projects(&ctx),

        Commands::Watch(args) => cmd_watch(&ctx, args),

        // Read commands
        Commands::List(args) => cmd_list(&ctx, args),
        Commands::Show(args) => cmd_show(&ctx, args),
        Commands::Ready => cmd_ready(&ctx),
        Commands::Blocked => cmd_blocked(&ctx),
        Commands::Next => cmd_next(&ctx),
        Commands::Stats => cmd_stats(&ctx),
        Commands::Deps(args) => cmd_deps(&ctx, args),
        Commands::Check => cmd_check(&ctx),
        Commands::Tags => cmd_tags(&ctx),
    }
}

/// Resolved global options shared by every handler
pub struct Context {
    pub json: bool,
    pub tag: String,
    pub config: DeckConfig,
    file: Option<PathBuf>,
    last: bool,
    project: Option<String>,
}

impl Context {
    fn new(cli: &Cli, config: DeckConfig) -> Self {
        Context {
            json: cli.json,
            tag: cli
                .tag
                .clone()
                .unwrap_or_else(|| config.view.default_tag.clone()),
            file: cli.file.clone(),
            last: cli.last,
            project: cli.project.clone(),
            config,
        }
    }

    /// The snapshot store, unless disabled in config
    pub fn store(&self) -> Option<JsonSnapshotStore> {
        if !self.config.store.enabled {
            return None;
        }
        let path = self
            .config
            .store
            .path
            .clone()
            .unwrap_or_else(store::default_store_path);
        Some(JsonSnapshotStore::new(path))
    }

    /// Whether the document comes from the snapshot store rather than a file
    pub fn reads_store(&self) -> bool {
        self.last || self.project.is_some()
    }

    /// `--file`, or the nearest tasks file above the working directory
    pub fn resolve_file(&self) -> Result<PathBuf, ProjectError> {
        if let Some(file) = &self.file {
            return Ok(file.clone());
        }
        let cwd = std::env::current_dir().map_err(|e| ProjectError::Read {
            path: PathBuf::from("."),
            source: e,
        })?;
        project_io::discover_tasks_file(&cwd)
    }

    /// Load the document the command should read
    fn load(&self) -> Result<Document, Box<dyn Error>> {
        if let Some(project) = &self.project {
            let store = self
                .store()
                .ok_or("the snapshot store is disabled in config")?;
            let key = store::project_key(&expand_home(project));
            return store.load(&key)?.ok_or_else(|| {
                format!("no saved project: {} (see `td projects`)", project).into()
            });
        }
        if self.last {
            let store = self
                .store()
                .ok_or("the snapshot store is disabled in config")?;
            return store
                .load_last()?
                .ok_or_else(|| "no saved snapshot yet; run a command with a task file first".into());
        }

        let path = self.resolve_file()?;
        let doc = project_io::load_document(&path)?;
        self.save_snapshot(&path, &doc);
        Ok(doc)
    }

    /// Best effort: a failed save is logged, never reported as an error
    fn save_snapshot(&self, path: &Path, doc: &Document) {
        let Some(store) = self.store() else {
            return;
        };
        let source = LocalFileSource::new(path);
        if let Err(e) = store.save(source.identity(), doc) {
            tracing::warn!(store = %store.path().display(), error = %e, "could not save snapshot");
        }
    }

    fn tasks<'a>(&self, doc: &'a Document) -> Result<&'a [Task], String> {
        doc.tag(&self.tag)
            .map(|t| t.tasks.as_slice())
            .ok_or_else(|| {
                format!(
                    "tag not found: {} (available: {})",
                    self.tag,
                    doc.tag_names().join(", ")
                )
            })
    }
}

/// `~/x` as listed by `td projects`, back to an absolute path
fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) if !home.is_empty() => {
            format!("{}/{}", home.trim_end_matches('/'), rest)
        }
        _ => path.to_string(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

/// Open tasks that could be picked up
fn is_open(task: &Task) -> bool {
    matches!(task.status, Status::Pending | Status::InProgress)
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_list(ctx: &Context, args: ListArgs) -> CmdResult {
    let doc = ctx.load()?;
    let tasks = ctx.tasks(&doc)?;

    let filter = TaskFilter {
        statuses: args.status.iter().map(|s| Status::from(s.as_str())).collect(),
        priorities: args
            .priority
            .iter()
            .map(|p| Priority::from(p.as_str()))
            .collect(),
        search: args.search,
        has_subtasks: match (args.with_subtasks, args.without_subtasks) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
    };
    let shown = filter.apply(tasks);

    if ctx.json {
        let rows: Vec<TaskRowJson> = shown
            .iter()
            .map(|task| TaskRowJson {
                task,
                ready: graph::is_ready(task, tasks),
                blocked: graph::is_blocked(task, tasks),
            })
            .collect();
        return print_json(&rows);
    }

    if shown.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for task in &shown {
        print_lines(&format_task_tree(task));
    }
    Ok(())
}

fn cmd_show(ctx: &Context, args: ShowArgs) -> CmdResult {
    let doc = ctx.load()?;
    let tasks = ctx.tasks(&doc)?;
    let id = TaskId::from(args.id.as_str());

    if let Some(task) = graph::find_task(tasks, &id) {
        if ctx.json {
            return print_json(&TaskDetailJson {
                task,
                ready: graph::is_ready(task, tasks),
                blocked: graph::is_blocked(task, tasks),
                blocked_by: graph::blockers(task, tasks)
                    .iter()
                    .map(blocker_to_json)
                    .collect(),
                log: parse_embedded_log(&task.details),
            });
        }
        print_lines(&format_task_detail(task, tasks));
        return Ok(());
    }

    // P.S addresses a subtask
    let (parent_id, sub_id) = args
        .id
        .split_once('.')
        .ok_or_else(|| format!("task not found: {}", args.id))?;
    let parent = graph::find_task(tasks, &TaskId::from(parent_id))
        .ok_or_else(|| format!("task not found: {}", parent_id))?;
    let subtask = parent
        .subtasks
        .iter()
        .find(|s| s.id == TaskId::from(sub_id))
        .ok_or_else(|| format!("subtask not found: {}", args.id))?;

    if ctx.json {
        return print_json(&SubtaskDetailJson {
            parent_id: &parent.id,
            subtask,
            ready: graph::is_subtask_ready(parent, subtask, tasks),
            blocked: graph::is_subtask_blocked(parent, subtask, tasks),
            log: parse_embedded_log(subtask.details.as_deref().unwrap_or_default()),
        });
    }
    print_lines(&format_subtask_detail(parent, subtask, tasks));
    Ok(())
}

fn cmd_ready(ctx: &Context) -> CmdResult {
    let doc = ctx.load()?;
    let tasks = ctx.tasks(&doc)?;
    let ready: Vec<&Task> = tasks
        .iter()
        .filter(|t| is_open(t) && graph::is_ready(t, tasks))
        .collect();

    if ctx.json {
        return print_json(&ready);
    }
    if ready.is_empty() {
        println!("No ready tasks.");
    }
    for task in ready {
        println!("{}", format_task_line(task));
    }
    Ok(())
}

fn cmd_blocked(ctx: &Context) -> CmdResult {
    let doc = ctx.load()?;
    let tasks = ctx.tasks(&doc)?;
    let blocked: Vec<(&Task, Vec<graph::Blocker>)> = tasks
        .iter()
        .filter(|t| graph::is_blocked(t, tasks))
        .map(|t| (t, graph::blockers(t, tasks)))
        .collect();

    if ctx.json {
        let output: Vec<BlockedJson> = blocked
            .iter()
            .map(|(task, blockers)| BlockedJson {
                id: &task.id,
                title: &task.title,
                status: &task.status,
                blocked_by: blockers.iter().map(blocker_to_json).collect(),
            })
            .collect();
        return print_json(&output);
    }
    if blocked.is_empty() {
        println!("No blocked tasks.");
    }
    for (task, blockers) in &blocked {
        println!("{}", format_blocked_line(task, blockers));
    }
    Ok(())
}

fn cmd_next(ctx: &Context) -> CmdResult {
    let doc = ctx.load()?;
    let tasks = ctx.tasks(&doc)?;
    let next = graph::recommend_next(tasks);

    if ctx.json {
        return print_json(&next);
    }
    match next {
        Some(task) => {
            println!("{}", format_task_line(task));
            if graph::is_blocked(task, tasks) {
                let blockers = graph::blockers(task, tasks);
                println!("  note: every open task is blocked");
                println!("  {}", format_blocked_line(task, &blockers));
            }
        }
        None => println!("Nothing to do."),
    }
    Ok(())
}

fn cmd_stats(ctx: &Context) -> CmdResult {
    let doc = ctx.load()?;
    let tasks = ctx.tasks(&doc)?;
    let summary = stats::task_stats(tasks);
    let metrics = graph::dependency_metrics(tasks);

    if ctx.json {
        return print_json(&StatsJson {
            tag: &ctx.tag,
            stats: summary,
            dependencies: metrics.as_ref().map(metrics_to_json),
            edges: graph::dependency_edges(tasks),
        });
    }
    print_lines(&format_stats(&summary, metrics.as_ref()));
    Ok(())
}

fn cmd_deps(ctx: &Context, args: DepsArgs) -> CmdResult {
    let doc = ctx.load()?;
    let tasks = ctx.tasks(&doc)?;
    let id = TaskId::from(args.id.as_str());
    if graph::find_task(tasks, &id).is_none() {
        return Err(format!("task not found: {}", args.id).into());
    }
    let tree = graph::dependency_tree(&id, tasks);

    if ctx.json {
        return print_json(&dep_tree_to_json(&tree));
    }
    print_lines(&format_dep_tree(&tree));
    Ok(())
}

fn cmd_check(ctx: &Context) -> CmdResult {
    let doc = ctx.load()?;
    let result = check::check_document(&doc);

    if ctx.json {
        return print_json(&result);
    }
    print_lines(&format_check(&result));
    Ok(())
}

fn cmd_tags(ctx: &Context) -> CmdResult {
    let doc = ctx.load()?;

    if ctx.json {
        let tags: Vec<TagJson> = doc.tags().map(|(name, tag)| tag_to_json(name, tag)).collect();
        return print_json(&tags);
    }
    for (name, tag) in doc.tags() {
        println!("{}", format_tag_line(name, tag));
    }
    Ok(())
}

fn cmd_projects(ctx: &Context) -> CmdResult {
    let store = ctx
        .store()
        .ok_or("the snapshot store is disabled in config")?;
    let projects = store.list();

    if ctx.json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No saved projects.");
        println!();
        println!("Run any `td` command against a tasks.json to save a snapshot.");
        return Ok(());
    }
    print_lines(&format_project_lines(&projects));
    Ok(())
}
