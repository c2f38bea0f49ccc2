use crate::config::Config;
use crate::db::schema::create_schema;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;

pub type DbPool = DatabaseConnection;

/// Connects to the configured store and creates any missing tables.
pub async fn create_pool(config: &Config) -> Result<DbPool, anyhow::Error> {
    let url = config.database_url();

    let mut options = ConnectOptions::new(url);
    options
        .max_connections(config.database.max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    create_schema(&db).await?;

    log::info!(
        "Database schema ready ({:?} backend)",
        db.get_database_backend()
    );
    Ok(db)
}
