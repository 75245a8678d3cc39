use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use procurement_api::migrator::{self, Migrator};

#[derive(Parser)]
#[command(name = "migration", about = "Manage the procurement database schema", version)]
struct Cli {
    /// Database URL; falls back to DATABASE_URL, then APP__DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up,
    /// Roll back the most recent migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
    /// Drop all tables and re-apply every migration
    Fresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .or_else(|| std::env::var("APP__DATABASE_URL").ok())
        .context("set --database-url or DATABASE_URL")?;

    let db = migrator::connect(&database_url)
        .await
        .context("failed to connect to database")?;

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => {
            Migrator::up(&db, None).await?;
            info!("Migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&db, Some(steps)).await?;
            info!(steps, "Migrations rolled back");
        }
        Command::Status => {
            Migrator::status(&db).await?;
        }
        Command::Fresh => {
            Migrator::fresh(&db).await?;
            info!("Schema recreated");
        }
    }

    Ok(())
}
