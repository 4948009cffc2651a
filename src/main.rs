//! CodeEagle CLI entry point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codeeagle_core::GraphError;

mod commands;

#[derive(Parser)]
#[command(name = "codeeagle")]
#[command(about = "Persistent knowledge graph of a source tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .codeeagle/config.yaml and register the project
    Init {
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Full sync: parse everything, then run the linker
    Index {
        /// Branch to write (defaults to the checked-out git branch)
        #[arg(short, long)]
        branch: Option<String>,
    },
    /// Incremental sync: only changed paths
    Sync {
        #[arg(short, long)]
        branch: Option<String>,
    },
    /// Watch the working tree and sync on changes
    Watch {
        #[arg(short, long)]
        branch: Option<String>,
    },
    /// Export one branch to a portable graph file
    Export {
        #[arg(short, long)]
        branch: Option<String>,
        /// Output file (defaults to the .codeeagleproj entry)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Import a portable graph file into a branch
    Import {
        /// Export file to read
        #[arg(short, long)]
        file: PathBuf,
        /// Target branch (defaults to the file's declared branch)
        #[arg(short, long)]
        branch: Option<String>,
    },
    /// List branches, or drop one
    Branches {
        /// Drop this branch instead of listing
        #[arg(long)]
        drop: Option<String>,
    },
    /// Node and edge counts by type
    Stats {
        #[arg(short, long)]
        branch: Option<String>,
    },
    /// Query nodes by structural filter
    Query {
        #[arg(short, long)]
        branch: Option<String>,
        /// Node type tag, e.g. function, struct, file
        #[arg(short = 't', long = "type")]
        node_type: Option<String>,
        /// Name glob, matched case-insensitively
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        package: Option<String>,
        /// Repository-relative file path
        #[arg(short, long)]
        file: Option<String>,
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Rewrite absolute paths in the store to repository-relative form
    MigratePaths {
        /// Repository roots whose prefixes should be stripped
        roots: Vec<PathBuf>,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init { name } => commands::init(cli.root, name),
        Commands::Index { branch } => commands::index(cli.root, branch).await,
        Commands::Sync { branch } => commands::sync(cli.root, branch).await,
        Commands::Watch { branch } => commands::watch(cli.root, branch).await,
        Commands::Export { branch, out } => commands::export(cli.root, branch, out),
        Commands::Import { file, branch } => commands::import(cli.root, file, branch),
        Commands::Branches { drop } => commands::branches(cli.root, drop),
        Commands::Stats { branch } => commands::stats(cli.root, branch),
        Commands::Query {
            branch,
            node_type,
            name,
            package,
            file,
            language,
        } => commands::query(cli.root, branch, node_type, name, package, file, language),
        Commands::MigratePaths { roots, dry_run } => {
            commands::migrate_paths(cli.root, roots, dry_run)
        }
        Commands::Version => {
            println!("codeeagle v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Bad flags are a user error; --help/--version are not
            let is_usage = err.use_stderr();
            let _ = err.print();
            return ExitCode::from(if is_usage { 1 } else { 0 });
        }
    };

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "codeeagle={log_level}"
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<GraphError>() {
            Some(GraphError::Cancelled) => {
                tracing::info!("cancelled");
                ExitCode::SUCCESS
            }
            Some(graph_err) if graph_err.is_user_error() => {
                eprintln!("error: {err:#}");
                ExitCode::from(1)
            }
            _ => {
                eprintln!("internal error: {err:#}");
                ExitCode::from(2)
            }
        },
    }
}
