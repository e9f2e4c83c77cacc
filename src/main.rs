use clap::Parser;
use taskdeck::cli::commands::Cli;
use taskdeck::cli::handlers;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // TASKDECK_LOG wins over -v
    let default_filter = if cli.verbose {
        "taskdeck=debug"
    } else {
        "taskdeck=warn"
    };
    let filter = EnvFilter::try_from_env("TASKDECK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
