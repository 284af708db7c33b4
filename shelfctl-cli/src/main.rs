//! shelfctl - command-line front end for the book-swap catalogue
//!
//! One-shot subcommands map straight onto the table facade; `shell` runs
//! the interactive menu. Facade errors are printed as-is and select the
//! exit status (see [`error::CliError`]).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use shelfctl_core::coerce::split_values;
use shelfctl_core::config::load_dotenv;
use shelfctl_core::storage::create_pool_with_options;
use shelfctl_core::{MemoryStorage, PgStorage, ShelfConfig, Storage, TableAccess};
use tracing::{debug, info};

mod error;
mod render;
mod shell;
mod tracing_setup;

use error::CliError;
use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "shelfctl",
    author,
    version,
    about = "Browse and edit the book-swap catalogue (users, books, listings, requests)"
)]
struct Cli {
    /// PostgreSQL connection string (overrides DATABASE_URL and the config file)
    #[arg(long, global = true, value_name = "URL")]
    database_url: Option<String>,

    /// Use a throwaway in-memory store instead of PostgreSQL
    #[arg(long, global = true, conflicts_with = "database_url")]
    memory: bool,

    /// Skip applying embedded migrations on connect
    #[arg(long, global = true)]
    no_migrate: bool,

    /// Config file (default: ~/.shelfctl/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered tables and their column order
    Tables,
    /// Print every row of a table
    List(ListArgs),
    /// Insert one record from comma-separated values
    Insert(InsertArgs),
    /// Overwrite the record with the given ID
    Update(UpdateArgs),
    /// Delete the record with the given ID
    Delete(DeleteArgs),
    /// Interactive menu (view / insert / modify / remove)
    Shell,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Table name (case-sensitive)
    table: String,

    /// Emit `{headers, rows}` as JSON instead of a text table
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct InsertArgs {
    /// Table name (case-sensitive)
    table: String,

    /// Column values in schema order, comma separated
    values: String,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Table name (case-sensitive)
    table: String,

    /// Primary key of the record to overwrite
    id: String,

    /// New values for every column in schema order, comma separated
    values: String,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    /// Table name (case-sensitive)
    table: String,

    /// Primary key of the record to delete
    id: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = tracing_setup::init(&TracingConfig { debug: cli.debug }) {
        eprintln!("Warning: failed to initialize logging: {err}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            err.exit_code()
        }
    }
}

async fn run(cli: Cli) -> std::result::Result<(), CliError> {
    let storage = open_storage(&cli).await?;
    let access = TableAccess::new(storage);
    debug!(backend = access.backend(), "table facade ready");

    match cli.command {
        Commands::Tables => {
            for schema in access.registry().all_schemas() {
                println!("{:<10} {}", schema.name(), schema.headers().join(", "));
            }
        }
        Commands::List(args) => {
            let data = access.list_table(&args.table).await?;
            if args.json {
                let json = render::render_json(&data).context("Failed to encode JSON")?;
                println!("{json}");
            } else {
                print!("{}", render::render_table(&data));
            }
        }
        Commands::Insert(args) => {
            let values = split_values(&args.values);
            access.insert_record(&args.table, &values).await?;
            println!("Record inserted successfully.");
        }
        Commands::Update(args) => {
            let values = split_values(&args.values);
            access.update_record(&args.table, &args.id, &values).await?;
            println!("Record updated successfully.");
        }
        Commands::Delete(args) => {
            access.delete_record(&args.table, &args.id).await?;
            println!("Record deleted successfully.");
        }
        Commands::Shell => shell::run(&access).await?,
    }

    Ok(())
}

async fn open_storage(cli: &Cli) -> Result<Arc<dyn Storage>> {
    if cli.memory {
        info!("Using in-memory storage; nothing is persisted");
        return Ok(Arc::new(MemoryStorage::new()));
    }

    load_dotenv();
    let config = ShelfConfig::load(cli.config.as_deref())?;
    let url = config.database_url(cli.database_url.as_deref());

    let pool = create_pool_with_options(&url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;
    let storage = PgStorage::new(pool);

    if config.database.run_migrations && !cli.no_migrate {
        storage
            .migrate()
            .await
            .context("Failed to run database migrations")?;
    } else {
        debug!("Skipping migrations");
    }

    Ok(Arc::new(storage))
}
