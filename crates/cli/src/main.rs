//! `deskpack` – dev & packaging orchestrator for web apps in a desktop shell.
//!
//! `start` supervises the dev-server/shell process pair; `package` runs the
//! staged packaging pipeline; `prebuild` and `autolink` expose the two
//! idempotent maintenance steps on their own.

use clap::{Parser, Subcommand};
use engine::{EngineError, ProjectLayout, Supervisor};
use std::path::PathBuf;

// ===========================================================================
// CLI definition
// ===========================================================================

#[derive(Parser)]
#[command(
    name = "deskpack",
    version,
    about = "Bridge a web dev server and a desktop shell, and package the result"
)]
struct Cli {
    /// Project root (defaults to the current directory).
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dev session: web server + desktop shell, supervised.
    Start {
        /// Dev-server endpoint to probe instead of the default candidates.
        #[arg(long)]
        url: Option<String>,
        /// Overall readiness deadline in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Create the editable desktop scaffold (never overwrites your edits).
    Prebuild,

    /// Export the web app and assemble a desktop package.
    Package {
        /// Distributable formats to produce (e.g. "zip,deb"). Omit to
        /// produce the packaged app only.
        #[arg(long, value_delimiter = ',')]
        make: Vec<String>,
    },

    /// Re-run native resource linking only.
    Autolink,
}

// ===========================================================================
// Main
// ===========================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let root = match cli.project_root {
        Some(path) => path,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!(error = %e, "cannot determine current directory");
                std::process::exit(1);
            }
        },
    };
    let layout = ProjectLayout::new(&root);

    // Only the subcommands that drive external tools need configuration;
    // prebuild and autolink must work even with a broken deskpack.yaml.
    match cli.command {
        Commands::Start { url, timeout } => {
            let mut config = load_config(&root);
            // Explicit flags take precedence over environment and file.
            if url.is_some() {
                config.dev_url = url;
            }
            if let Some(secs) = timeout {
                config.ready_timeout_secs = secs;
            }
            cmd_start(config, layout).await;
        }
        Commands::Prebuild => cmd_prebuild(&layout),
        Commands::Package { make } => {
            let config = load_config(&root);
            cmd_package(&config, &layout, &make).await;
        }
        Commands::Autolink => cmd_autolink(&layout).await,
    }
}

fn load_config(root: &std::path::Path) -> engine::OrchestratorConfig {
    match engine::config::load(root) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "configuration failed to load");
            std::process::exit(1);
        }
    }
}

// ===========================================================================
// Subcommand implementations
// ===========================================================================

async fn cmd_start(config: engine::OrchestratorConfig, layout: ProjectLayout) {
    match Supervisor::new(config, layout).run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "dev session failed to start");
            let code = match e {
                EngineError::MissingBinary { .. } => 2,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}

fn cmd_prebuild(layout: &ProjectLayout) {
    // Prebuild always exits 0 once attempted; problems are reported but the
    // scaffold state is whatever could be ensured.
    match engine::scaffold::ensure_scaffold(layout) {
        Ok(stats) => {
            println!(
                "scaffold ready at {} ({} created, {} kept)",
                layout.scaffold_dir().display(),
                stats.copied,
                stats.skipped
            );
        }
        Err(e) => tracing::error!(error = %e, "prebuild could not complete"),
    }
    std::process::exit(0);
}

async fn cmd_package(
    config: &engine::OrchestratorConfig,
    layout: &ProjectLayout,
    make: &[String],
) {
    match engine::pipeline::run_package(config, layout, make).await {
        Ok(()) => {
            println!(
                "packaged app ready under {}",
                layout.workspace_dir().display()
            );
            std::process::exit(0);
        }
        Err(e) => {
            tracing::error!(error = %e, "packaging failed");
            std::process::exit(e.exit_code());
        }
    }
}

async fn cmd_autolink(layout: &ProjectLayout) {
    match engine::pipeline::run_autolink(layout).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, "resource linking failed");
            std::process::exit(3);
        }
    }
}
