//! oxide-migrate-sql CLI
//!
//! Command-line tool for planning SQL construct migrations.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_migrate_sql::prelude::*;

/// Dependency-aware migrations for SQL constructs.
#[derive(Parser)]
#[command(name = "oxide-migrate-sql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Migration log lines.
    Text,
    /// Full plan as JSON.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan the steps needed to go from one declarations file to another.
    Plan {
        /// Declarations of the current state (empty if not specified).
        #[arg(short, long, env = "OXIDE_SQL_FROM")]
        from: Option<PathBuf>,

        /// Declarations of the desired state.
        #[arg(short, long)]
        to: PathBuf,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Don't emit steps for removed constructs.
        #[arg(long)]
        no_delete: bool,

        /// Only show steps of these namespaces (text output).
        #[arg(short, long)]
        namespace: Vec<String>,
    },

    /// Build and resolve a declarations file.
    Check {
        /// Declarations file.
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Plan {
            from,
            to,
            format,
            no_delete,
            namespace,
        } => {
            let from_graph = match &from {
                Some(path) => Declarations::load(path)?.build_graph()?,
                None => SqlStateGraph::new(),
            };
            let to_graph = Declarations::load(&to)?.build_graph()?;

            let mut options = AutodetectorOptions::new();
            if no_delete {
                options = options.without_deletions();
            }
            let plan = Autodetector::with_options(options).plan(&from_graph, &to_graph)?;

            let writer = PlanWriter::new().only_namespaces(namespace);
            match format {
                Format::Text => println!("{}", writer.render_text(&plan)),
                Format::Json => println!("{}", writer.render_json(&plan)?),
            }
        }

        Commands::Check { file } => {
            let declarations = Declarations::load(&file)?;
            let graph = declarations.build_graph()?;
            graph.check_acyclic()?;
            info!(
                constructs = graph.len(),
                edges = graph.edge_count(),
                "Declarations are valid"
            );
        }
    }

    Ok(())
}
