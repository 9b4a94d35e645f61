//! Archgraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "archgraph")]
#[command(about = "Architecture model and diagram engine for source repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Project id used for persistence keys
    #[arg(short, long, default_value = "default")]
    project: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the repository and persist graph + diagram
    Analyze {
        /// Reference (commit sha or label) identifying this snapshot
        #[arg(long, default_value = "worktree")]
        r#ref: String,

        /// Prior reference for an incremental run
        #[arg(long)]
        since: Option<String>,

        /// Skip pattern detection
        #[arg(long)]
        no_patterns: bool,

        /// Skip AI styling, deterministic rendering only
        #[arg(long)]
        no_ai: bool,

        /// Emit a left-to-right component view instead of a flowchart
        #[arg(long)]
        component_view: bool,

        /// Write the rendered markup here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render the stored diagram model for the project
    Diagram {
        /// Emit a left-to-right component view instead of a flowchart
        #[arg(long)]
        component_view: bool,
    },
    /// Summarize a stored analysis
    Show {
        /// Reference of the stored snapshot
        #[arg(long, default_value = "worktree")]
        r#ref: String,
    },
    /// Delete a stored analysis and its diagram
    Delete {
        /// Reference of the stored snapshot
        #[arg(long, default_value = "worktree")]
        r#ref: String,
    },
    /// Clear the cache
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Archgraph v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Repository root: {}", cli.root.display());

    match cli.command {
        Commands::Analyze {
            r#ref,
            since,
            no_patterns,
            no_ai,
            component_view,
            output,
        } => {
            commands::analyze(
                cli.root,
                cli.project,
                r#ref,
                since,
                commands::AnalyzeFlags {
                    no_patterns,
                    no_ai,
                    component_view,
                    output,
                },
            )
            .await
        }
        Commands::Diagram { component_view } => {
            commands::diagram(cli.root, cli.project, component_view).await
        }
        Commands::Show { r#ref } => commands::show(cli.root, cli.project, r#ref).await,
        Commands::Delete { r#ref } => commands::delete(cli.root, cli.project, r#ref).await,
        Commands::Clear => commands::clear(cli.root),
        Commands::Version => {
            println!("Archgraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
