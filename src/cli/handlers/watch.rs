use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use super::Context;
use crate::cli::commands::WatchArgs;
use crate::cli::output::{format_blocked_line, format_task_line};
use crate::io::source::LocalFileSource;
use crate::model::document::Document;
use crate::model::task::Task;
use crate::ops::graph;
use crate::ops::stats::{self, TaskStats};
use crate::sync::{LiveSync, Reconciler, SnapshotCell, SyncState, SyncStatus};

/// One line of `td watch --json` output
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchEvent<'a> {
    Snapshot {
        tag: &'a str,
        stats: TaskStats,
        ready: usize,
        blocked: usize,
        next: Option<&'a Task>,
    },
    Error {
        message: &'static str,
        detail: &'a str,
    },
    Missing {
        tag: &'a str,
    },
}

pub fn cmd_watch(ctx: &Context, args: WatchArgs) -> Result<(), Box<dyn Error>> {
    if ctx.reads_store() {
        return Err("watch follows a file; --last and --project read saved snapshots".into());
    }
    let path = ctx.resolve_file()?;
    let interval = args
        .interval_ms
        .map(|ms| Duration::from_millis(ms.max(1)))
        .unwrap_or_else(|| ctx.config.sync.poll_interval());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch_file(ctx, path, interval))
}

async fn watch_file(ctx: &Context, path: PathBuf, interval: Duration) -> Result<(), Box<dyn Error>> {
    let mut reconciler = Reconciler::new(
        Arc::new(SnapshotCell::new()),
        ctx.config.sync.read_timeout(),
    );
    if let Some(store) = ctx.store() {
        reconciler = reconciler.with_store(Arc::new(store));
    }
    let reconciler = Arc::new(reconciler);
    let mut updates = reconciler.subscribe();
    let mut status = reconciler.watch_status();

    let mut live = LiveSync::new(Arc::clone(&reconciler), interval);
    live.bind(Arc::new(LocalFileSource::new(&path)));
    if !ctx.json {
        eprintln!("watching {} (ctrl-c to stop)", path.display());
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            update = updates.recv() => match update {
                Ok(doc) => print_snapshot(ctx, &doc)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "display fell behind, skipping to newest snapshot");
                }
                Err(RecvError::Closed) => break,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                print_status(ctx, &current)?;
            }
        }
    }

    live.unbind();
    Ok(())
}

fn print_snapshot(ctx: &Context, doc: &Document) -> Result<(), Box<dyn Error>> {
    let Some(tag) = doc.tag(&ctx.tag) else {
        if ctx.json {
            println!("{}", serde_json::to_string(&WatchEvent::Missing { tag: &ctx.tag })?);
        } else {
            println!("tag not found: {}", ctx.tag);
        }
        return Ok(());
    };
    let tasks = &tag.tasks;
    let summary = stats::task_stats(tasks);
    let ready = tasks.iter().filter(|t| graph::is_ready(t, tasks)).count();
    let blocked = tasks.iter().filter(|t| graph::is_blocked(t, tasks)).count();
    let next = graph::recommend_next(tasks);

    if ctx.json {
        let event = WatchEvent::Snapshot {
            tag: &ctx.tag,
            stats: summary,
            ready,
            blocked,
            next,
        };
        println!("{}", serde_json::to_string(&event)?);
        return Ok(());
    }

    println!(
        "── {} {} tasks, {}% done, {} ready, {} blocked",
        chrono::Local::now().format("%H:%M:%S"),
        summary.total,
        summary.completion_percent,
        ready,
        blocked
    );
    match next {
        Some(task) if graph::is_blocked(task, tasks) => {
            println!(
                "   next: {}",
                format_blocked_line(task, &graph::blockers(task, tasks))
            );
        }
        Some(task) => println!("   next: {}", format_task_line(task)),
        None => println!("   next: nothing to do"),
    }
    Ok(())
}

fn print_status(ctx: &Context, status: &SyncStatus) -> Result<(), Box<dyn Error>> {
    let SyncState::Error(fault) = &status.state else {
        return Ok(());
    };
    if ctx.json {
        let event = WatchEvent::Error {
            message: fault.message(),
            detail: fault.detail(),
        };
        println!("{}", serde_json::to_string(&event)?);
    } else {
        eprintln!("!! {} ({})", fault.message(), fault.detail());
    }
    Ok(())
}
