//! Suite Store - command-line front end for the test-suite database.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use suite_store_lib::config::SuiteStoreConfig;
use suite_store_lib::infra::Database;
use suite_store_lib::MigrateAction;

#[derive(Parser)]
#[command(name = "suite-store")]
#[command(about = "Test-suite database management", version)]
struct Cli {
    /// Database URL or SQLite file path
    #[arg(short, long, global = true, env = "SUITE_STORE_DATABASE")]
    database: Option<String>,

    /// Directory holding the test-suite schema files
    #[arg(short, long, global = true, env = "SUITE_STORE_SCHEMAS_DIR")]
    schemas_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },
    /// List the loaded test-suites
    Suites,
    /// Load and validate every schema, then exit
    Check,
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = SuiteStoreConfig::from_env().with_overrides(cli.database, cli.schemas_dir);
    tracing::debug!(?config, "Configuration loaded");

    let result = match cli.command {
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateCommands::Up => MigrateAction::Up,
                MigrateCommands::Down => MigrateAction::Down,
                MigrateCommands::Status => MigrateAction::Status,
                MigrateCommands::Fresh => MigrateAction::Fresh,
            };
            suite_store_lib::run_migrations(config, migrate_action).await
        }
        Commands::Suites => suite_store_lib::list_suites(config).await.map(|suites| {
            for s in suites {
                println!(
                    "{:<24} machine={} order={} run={} metrics={}  ({})",
                    s.name, s.machine_fields, s.order_fields, s.run_fields, s.metrics, s.origin
                );
            }
        }),
        Commands::Check => suite_store_lib::check_schemas(config).await.map(|count| {
            println!("{} test-suite(s) loaded", count);
        }),
    };

    Database::close_all_engines().await;

    if let Err(e) = result {
        tracing::error!(code = e.code(), "Command failed: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
