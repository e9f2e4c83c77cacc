use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "td", about = concat!("[>] taskdeck v", env!("CARGO_PKG_VERSION"), " - what's ready, what's blocked, what's next"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Task file to read (default: nearest .taskmaster/tasks/tasks.json)
    #[arg(short = 'f', long, global = true, env = "TASKDECK_FILE")]
    pub file: Option<PathBuf>,

    /// Use the most recently saved snapshot instead of a file
    #[arg(long, global = true, conflicts_with = "file")]
    pub last: bool,

    /// Read a saved project instead of a file (store key or file path, see `td projects`)
    #[arg(long, global = true, conflicts_with_all = ["file", "last"])]
    pub project: Option<String>,

    /// Tag to read tasks from (default: master)
    #[arg(long, global = true)]
    pub tag: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: $XDG_CONFIG_HOME/taskdeck/taskdeck.toml)
    #[arg(long, global = true, env = "TASKDECK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tasks, optionally filtered
    List(ListArgs),
    /// Show task details, including its parsed progress log
    Show(ShowArgs),
    /// Show open tasks whose dependencies are all done
    Ready,
    /// Show blocked tasks and what blocks them
    Blocked,
    /// Recommend the next task to work on
    Next,
    /// Show completion statistics and dependency metrics
    Stats,
    /// Show the dependency tree of a task
    Deps(DepsArgs),
    /// Validate the document's dependency graph
    Check,
    /// List tags in the document
    Tags,
    /// Follow the file and print updates as it changes
    Watch(WatchArgs),
    /// List projects with saved snapshots
    Projects,
}

#[derive(Args, Default)]
pub struct ListArgs {
    /// Only tasks with these statuses (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<String>,
    /// Only tasks with these priorities (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub priority: Vec<String>,
    /// Case-insensitive regex over title and description
    #[arg(long)]
    pub search: Option<String>,
    /// Only tasks that have subtasks
    #[arg(long, conflicts_with = "without_subtasks")]
    pub with_subtasks: bool,
    /// Only tasks without subtasks
    #[arg(long)]
    pub without_subtasks: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Task ID to show (use P.S for a subtask)
    pub id: String,
}

#[derive(Args)]
pub struct DepsArgs {
    /// Task ID
    pub id: String,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Poll interval in milliseconds (default from config)
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "td", "list", "--status", "pending,in-progress", "--tag", "feature", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.tag.as_deref(), Some("feature"));
        let Commands::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.status, vec!["pending", "in-progress"]);
    }

    #[test]
    fn file_and_last_conflict() {
        assert!(Cli::try_parse_from(["td", "--last", "-f", "x.json", "ready"]).is_err());
    }

    #[test]
    fn project_conflicts_with_other_sources() {
        let cli = Cli::try_parse_from(["td", "next", "--project", "_work_a"]).unwrap();
        assert_eq!(cli.project.as_deref(), Some("_work_a"));
        assert!(Cli::try_parse_from(["td", "--project", "k", "--last", "next"]).is_err());
        assert!(Cli::try_parse_from(["td", "--project", "k", "-f", "x.json", "next"]).is_err());
    }

    #[test]
    fn subtask_filters_conflict() {
        assert!(
            Cli::try_parse_from(["td", "list", "--with-subtasks", "--without-subtasks"]).is_err()
        );
    }
}
