use promo_service::{config, db, migrator::Migrator};
use sea_orm_migration::prelude::*;
use tracing::info;

/// Applies or rolls back the promo schema.
///
/// Usage: `migration [up|down|status|fresh]` (defaults to `up`). The database
/// URL comes from the regular service configuration.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());

    let cfg = config::load_config()?;
    info!("Connecting to database: {}", cfg.database_url());

    let conn = db::establish_connection_from_app_config(&cfg).await?;

    match command.as_str() {
        "up" => {
            Migrator::up(&conn, None).await?;
            info!("Migration completed successfully");
        }
        "down" => {
            Migrator::down(&conn, Some(1)).await?;
            info!("Rolled back the latest migration");
        }
        "fresh" => {
            Migrator::fresh(&conn).await?;
            info!("Dropped all tables and reapplied migrations");
        }
        "status" => {
            Migrator::status(&conn).await?;
        }
        other => {
            return Err(format!("unknown migration command: {other} (expected up, down, fresh or status)").into());
        }
    }

    db::close_pool(conn).await?;
    Ok(())
}
