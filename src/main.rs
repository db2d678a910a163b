use clap::Parser;
use redrive::adapters::PostgresStore;
use redrive::channel::PgMessageChannel;
use redrive::cli::{self, Cli, Commands, DeadLetterCommands};
use redrive::config::AppConfig;
use redrive::error::{RedriveError, Result};
use redrive::recovery::{DeadLetterService, PgDeadLetterStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Migrate => {
            init_logging();
            let store = connect(&cli.config).await?;
            store.migrate().await?;
        }
        Commands::DeadLetter(command) => {
            init_logging_simple();
            let store = connect(&cli.config).await?;
            let service = DeadLetterService::new(
                Arc::new(PgDeadLetterStore::new(store.pool().clone())),
                Arc::new(PgMessageChannel::new(store.pool().clone())),
            );

            match command {
                DeadLetterCommands::List { page } => cli::list(&service, *page).await?,
                DeadLetterCommands::Show { message_id, full } => {
                    cli::show(&service, message_id, *full).await?
                }
                DeadLetterCommands::Reply { message_id } => {
                    cli::reply(&service, message_id).await?
                }
                DeadLetterCommands::ReplyAll => cli::reply_all(&service).await?,
                DeadLetterCommands::Delete { message_id } => {
                    cli::delete(&service, message_id).await?
                }
            }
        }
    }

    Ok(())
}

async fn connect(config_dir: &str) -> Result<PostgresStore> {
    let config = AppConfig::load_from(config_dir)?;
    if let Err(errors) = config.validate() {
        return Err(RedriveError::Internal(format!(
            "invalid configuration: {}",
            errors.join("; ")
        )));
    }

    PostgresStore::new(&config.database.url, config.database.max_connections).await
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,redrive=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn init_logging_simple() {
    // Minimal logging for one-shot operator commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
