//! Folio CLI - incremental content rebuilds.
//!
//! Provides commands for:
//! - `build`: Bring rendered output up to date
//! - `get`: Print the rendered content of one page
//! - `status`: Show what the next build would do
//! - `watch`: Rebuild whenever sources change

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BuildArgs, GetArgs, ProjectArgs, StatusArgs};
use output::Output;

/// Folio - incremental content-rebuild engine.
#[derive(Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    #[command(flatten)]
    project: ProjectArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render changed pages (or all pages with --force).
    Build(BuildArgs),
    /// Print the rendered content of a page.
    Get(GetArgs),
    /// Show pages that would be rebuilt, without rendering.
    Status(StatusArgs),
    /// Rebuild whenever page sources change.
    Watch,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.project.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Build(args) => args.execute(&cli.project),
        Commands::Get(args) => args.execute(&cli.project),
        Commands::Status(args) => args.execute(&cli.project),
        Commands::Watch => commands::watch::execute(&cli.project),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
