use anyhow::Context;
use clap::{Parser, Subcommand};
use pos_api::{
    config,
    db::{self, DbConfig},
    migrator::Migrator,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

#[derive(Parser)]
#[command(name = "migration", about = "Manage the pos-api database schema", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Database URL; defaults to the configured database_url"
    )]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<MigrationCommand>,
}

#[derive(Subcommand, Clone, Copy)]
enum MigrationCommand {
    /// Apply all pending migrations (default)
    Up,
    /// Roll back the given number of migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let database_url = match cli.database_url {
        Some(url) => url,
        None => {
            config::load_config()
                .context("failed to load configuration")?
                .database_url
        }
    };
    config::init_tracing("info", false);

    let db_cfg = DbConfig {
        url: database_url,
        max_connections: 1,
        ..Default::default()
    };
    let pool = db::establish_connection_with_config(&db_cfg)
        .await
        .context("failed to connect to the database")?;

    match cli.command.unwrap_or(MigrationCommand::Up) {
        MigrationCommand::Up => db::run_migrations(&pool).await?,
        MigrationCommand::Down { steps } => {
            info!(steps, "Rolling back migrations");
            Migrator::down(&pool, Some(steps)).await?;
        }
        MigrationCommand::Status => Migrator::status(&pool).await?,
        MigrationCommand::Fresh => {
            info!("Dropping all tables and re-applying migrations");
            Migrator::fresh(&pool).await?;
        }
    }

    info!("Migration command completed");
    Ok(())
}
