use clap::{Parser, Subcommand};
use daylog_core::{HttpStore, RecordStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod db;

use commands::{ConfigCommand, LogCommand, MealCommand, WorkoutCommand};
use config::{Backend, Config};
use db::{init_db, SqliteStore};

#[derive(Parser)]
#[command(name = "daylog")]
#[command(version)]
#[command(about = "Daily workout and nutrition log", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// View and edit a day's workout
    Workout(WorkoutCommand),

    /// View and edit a day's meals
    Meal(MealCommand),

    /// Inspect stored records
    Log(LogCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daylog=info,daylog_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    let Some(command) = cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    if let Commands::Config(cmd) = &command {
        return cmd.run(&config);
    }

    match config.store.backend.value {
        Backend::Sqlite => {
            let pool = init_db(&config.database_path.value).await?;
            execute(command, Arc::new(SqliteStore::new(pool)), &config).await
        }
        Backend::Http => {
            let url = config
                .store
                .server_url
                .value
                .clone()
                .ok_or("No store server URL configured")?;
            let store = HttpStore::new(url, config.store.api_key.value.clone());
            execute(command, Arc::new(store), &config).await
        }
    }
}

async fn execute<S: RecordStore>(
    command: Commands,
    store: Arc<S>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Workout(cmd) => cmd.run(store, config).await,
        Commands::Meal(cmd) => cmd.run(store, config).await,
        Commands::Log(cmd) => cmd.run(store).await,
        Commands::Config(cmd) => cmd.run(config),
    }
}
