//! `chatflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`: start the API server.
//! - `migrate`: run pending database migrations.
//! - `validate`: check an exported workflow file.
//! - `layout`: auto-arrange an exported workflow file.
//! - `catalog`: print the node catalog.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use db::pool::PoolSettings;
use engine::{
    apply_layout, export_graph, import_str, ImportMode, LayoutConfig, LayoutDirection,
    MemoryWorkflowStore, PgWorkflowStore, WorkflowGraph, WorkflowStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "chatflow",
    about = "Authoring backend for WhatsApp chatbot workflows",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "WORKFLOW_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, env = "DATABASE_URL", required_unless_present = "memory")]
        database_url: Option<String>,
        #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
        max_connections: u32,
        /// Keep workflows in process memory instead of Postgres.
        #[arg(long)]
        memory: bool,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate an exported workflow file.
    Validate {
        /// Path to the export JSON file.
        path: PathBuf,
    },
    /// Re-arrange the nodes of an exported workflow file.
    Layout {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = Direction::LeftRight)]
        direction: Direction,
        /// Where to write the result; stdout if omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the node catalog as JSON.
    Catalog,
}

/// Flow direction accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Direction {
    #[value(name = "LR", alias = "lr")]
    LeftRight,
    #[value(name = "TB", alias = "tb")]
    TopBottom,
}

impl From<Direction> for LayoutDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::LeftRight => LayoutDirection::LeftRight,
            Direction::TopBottom => LayoutDirection::TopBottom,
        }
    }
}

fn read_graph(path: &Path) -> anyhow::Result<(WorkflowGraph, serde_json::Value)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    let mut graph = WorkflowGraph::new();
    import_str(&mut graph, &content, ImportMode::Replace)
        .with_context(|| format!("{} is not a valid workflow export", path.display()))?;
    // Already parsed once by the import; the metadata is optional.
    let raw = serde_json::from_str(&content).unwrap_or_default();
    Ok((graph, raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            database_url,
            max_connections,
            memory,
        } => {
            let store: Arc<dyn WorkflowStore> = match database_url.filter(|_| !memory) {
                Some(url) => {
                    let settings = PoolSettings::new(url).with_max_connections(max_connections);
                    let pool = db::pool::create_pool(&settings)
                        .await
                        .context("failed to connect to database")?;
                    db::pool::run_migrations(&pool).await.context("migration failed")?;
                    Arc::new(PgWorkflowStore::new(pool))
                }
                None => {
                    info!("using in-memory workflow store");
                    Arc::new(MemoryWorkflowStore::new())
                }
            };
            info!("Starting API server on {bind}");
            api::serve(&bind, store).await?;
        }
        Command::Migrate { database_url } => {
            let pool = db::pool::create_pool(&PoolSettings::new(database_url).with_max_connections(2))
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => {
            let (graph, _) = read_graph(&path)?;
            println!(
                "workflow is valid: {} nodes, {} edges, entry node {}",
                graph.nodes().len(),
                graph.edges().len(),
                graph.entry_node_id().unwrap_or("(none)")
            );
        }
        Command::Layout {
            path,
            direction,
            output,
        } => {
            let (mut graph, raw) = read_graph(&path)?;
            apply_layout(&mut graph, &LayoutConfig::with_direction(direction.into()));

            let id = raw["workflow"]["id"].as_str().unwrap_or_default();
            let name = raw["workflow"]["name"].as_str().unwrap_or_default();
            let json = serde_json::to_string_pretty(&export_graph(&graph, id, name))?;
            match output {
                Some(out) => {
                    std::fs::write(&out, json)
                        .with_context(|| format!("cannot write {}", out.display()))?;
                    info!(path = %out.display(), "layout written");
                }
                None => println!("{json}"),
            }
        }
        Command::Catalog => {
            println!("{}", serde_json::to_string_pretty(nodes::catalog::entries())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn layout_direction_parses_by_name() {
        let cli = Cli::try_parse_from(["chatflow", "layout", "flow.json", "--direction", "TB"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Layout { direction: Direction::TopBottom, .. }
        ));

        let cli = Cli::try_parse_from(["chatflow", "layout", "flow.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Layout { direction: Direction::LeftRight, .. }
        ));

        assert!(Cli::try_parse_from(["chatflow", "layout", "flow.json", "--direction", "RL"]).is_err());
    }
}
