//! assetgraph CLI: local operator front end for the asset inventory.
//!
//! Usage:
//!   assetgraph [--config file] [--db path] [--cluster name] entity <subcommand>
//!   assetgraph query <filter> [--offset n] [--limit n]
//!   assetgraph schema <subcommand>
//!
//! Every command prints a JSON envelope on stdout. Logs go to stderr.

use assetgraph::{AssetApi, AssetConfig, AssetError, Envelope, Pagination};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "assetgraph", version, about = "Cluster asset inventory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path to SQLite database file (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Cluster name stamped on ingested entities (overrides config)
    #[arg(long, global = true)]
    cluster: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, read, update, delete and sync entities
    Entity {
        #[command(subcommand)]
        action: EntityAction,
    },
    /// Run a QSL filter
    Query {
        /// Filter expression, e.g. 'objtype = pod and phase = Running'
        filter: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Page size (defaults to the configured limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Manage field predicates
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
}

#[derive(Subcommand)]
enum EntityAction {
    /// Normalize and store one object
    Create {
        kind: String,
        /// JSON file, or '-' for stdin
        file: PathBuf,
    },
    /// Fetch an entity by uid
    Get { uid: String },
    /// Merge attributes into an entity
    Update {
        kind: String,
        uid: String,
        /// JSON object file, or '-' for stdin
        file: PathBuf,
    },
    /// Delete an entity by resource id
    Delete { kind: String, resource_id: String },
    /// Bulk upsert a JSON array of objects in the background
    Sync {
        kind: String,
        /// JSON array file, or '-' for stdin
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Upsert a predicate object or a list of them
    Upsert {
        /// JSON file, or '-' for stdin
        file: PathBuf,
    },
    /// Show one predicate
    Get { name: String },
    /// Drop a predicate by name
    Drop { name: String },
    /// List all predicates
    List,
}

fn read_input(path: &Path) -> Result<Vec<u8>, String> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        return Ok(buf);
    }
    std::fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn load_config(cli: &Cli) -> Result<AssetConfig, String> {
    let mut config = match &cli.config {
        Some(path) => AssetConfig::from_file(path).map_err(|e| e.to_string())?,
        None => AssetConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.database = db.clone();
    }
    if let Some(cluster) = &cli.cluster {
        config.cluster = cluster.clone();
    }
    Ok(config)
}

async fn cmd_entity(api: &AssetApi, action: EntityAction) -> Result<Envelope, String> {
    Ok(match action {
        EntityAction::Create { kind, file } => {
            let payload = read_input(&file)?;
            Envelope::from_result(&api.create_entity(None, &kind, &payload))
        }
        EntityAction::Get { uid } => match api.get_entity(&uid) {
            Ok(Some(entity)) => Envelope::ok(&entity),
            Ok(None) => Envelope::error(&AssetError::NotFound(format!("entity {}", uid))),
            Err(e) => Envelope::error(&e),
        },
        EntityAction::Update { kind, uid, file } => {
            let payload = read_input(&file)?;
            Envelope::from_result(&api.update_entity(&kind, &uid, &payload))
        }
        EntityAction::Delete { kind, resource_id } => {
            Envelope::from_result(&api.delete_entity(&kind, &resource_id))
        }
        EntityAction::Sync { kind, file } => {
            let payload = read_input(&file)?;
            match api.sync_entities(None, &kind, &payload) {
                Ok(accepted) => {
                    // background writes must finish before exit
                    api.wait_for_sync().await;
                    let stats = api.sync_stats();
                    if let Some(s) = stats.get(&accepted.objtype) {
                        tracing::info!(
                            kind = %accepted.objtype,
                            synced = s.entities_synced,
                            failed = s.entities_failed,
                            "sync drained"
                        );
                    }
                    Envelope::accepted(format!(
                        "{} {} object(s) accepted for sync",
                        accepted.accepted, accepted.objtype
                    ))
                }
                Err(e) => Envelope::error(&e),
            }
        }
    })
}

fn cmd_schema(api: &AssetApi, action: SchemaAction) -> Result<Envelope, String> {
    Ok(match action {
        SchemaAction::Upsert { file } => {
            let payload = read_input(&file)?;
            Envelope::from_result(&api.upsert_schema(&payload))
        }
        SchemaAction::Get { name } => Envelope::from_result(&api.get_schema(&name)),
        SchemaAction::Drop { name } => Envelope::from_result(&api.drop_schema(&name)),
        SchemaAction::List => Envelope::from_result(&api.list_schema()),
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assetgraph=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let api = match AssetApi::open(&config) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = match cli.command {
        Commands::Entity { action } => cmd_entity(&api, action).await,
        Commands::Query {
            filter,
            offset,
            limit,
        } => Ok(Envelope::from_result(&api.run_query(
            &filter,
            Pagination { offset, limit },
        ))),
        Commands::Schema { action } => cmd_schema(&api, action),
    };

    let envelope = match outcome {
        Ok(envelope) => envelope,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
    std::process::exit(if envelope.is_success() { 0 } else { 1 });
}
