//! skpm: package manager for agent skills.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use skpm_registry::Settings;
use tracing_subscriber::EnvFilter;

use commands::Invocation;

#[derive(Parser)]
#[command(name = "skpm", version, about = "Package manager for agent skills")]
struct Cli {
    /// Registry locator (URL, file:// URL or directory)
    #[arg(long, global = true)]
    registry: Option<String>,
    /// Agent tool to link skills into (claude, codex, cursor, windsurf, gemini, copilot)
    #[arg(long = "tool", alias = "targets", global = true, value_name = "TOOL")]
    tools: Vec<String>,
    /// Project directory (default: nearest directory with skpm.json)
    #[arg(long, global = true)]
    project: Option<PathBuf>,
    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create skpm.json in the project directory
    Init {
        /// Project name (default: directory name)
        name: Option<String>,
    },
    /// Install the project's skills
    Install {
        /// Install exactly what skpm-lock.json records
        #[arg(long)]
        frozen: bool,
    },
    /// Add a skill and install it
    Add {
        /// Skill name, optionally with a range (e.g., "frontend@^1.2")
        spec: String,
        /// Version range (e.g., ">=1.0.0", "^1.2")
        #[arg(long)]
        range: Option<String>,
    },
    /// Remove a skill
    Remove {
        /// Skill name
        name: String,
    },
    /// Re-resolve and reinstall every skill
    Update,
    /// List the project's skills
    List,
    /// Search the registry
    Search {
        /// Matched against names and descriptions
        query: Option<String>,
    },
    /// Show a skill's metadata
    Info {
        /// Skill name
        name: String,
        /// Version to show (default: latest)
        #[arg(long)]
        version: Option<String>,
    },
    /// Show the locked dependency tree
    Tree,
    /// Publish a skill package
    Publish {
        /// Package directory (default: current directory)
        path: Option<PathBuf>,
        /// Collect and hash without publishing
        #[arg(long)]
        dry_run: bool,
        /// Bearer token (default: $SKPM_PUBLISH_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let inv = Invocation {
        cwd: std::env::current_dir()?,
        project: cli.project,
        registry: cli.registry,
        tools: cli.tools,
        json: cli.json,
        settings: Settings::load(),
    };
    tracing::debug!(home = %inv.settings.home.display(), "settings loaded");

    match cli.command {
        Commands::Init { name } => commands::init::run(&inv, name.as_deref()),
        Commands::Install { frozen } => commands::project::install(&inv, frozen),
        Commands::Add { spec, range } => commands::project::add(&inv, &spec, range.as_deref()),
        Commands::Remove { name } => commands::project::remove(&inv, &name),
        Commands::Update => commands::project::update(&inv),
        Commands::List => commands::project::list(&inv),
        Commands::Search { query } => commands::registry::search(&inv, query.as_deref()),
        Commands::Info { name, version } => {
            commands::registry::info(&inv, &name, version.as_deref())
        }
        Commands::Tree => commands::project::tree(&inv),
        Commands::Publish {
            path,
            dry_run,
            token,
        } => commands::registry::publish(&inv, path.as_deref(), dry_run, token.as_deref()),
    }
}
