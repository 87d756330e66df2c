use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::migrator::Migrator;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

/// Type alias for the shared database connection pool.
pub type DbPool = DatabaseConnection;

/// Build the connection pool from application configuration.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(cfg.database_url.clone());
    options
        .max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    info!(max_connections = cfg.db_max_connections, "database pool established");
    Ok(pool)
}

/// Ping the database, for readiness probes.
pub async fn check_connection(pool: &DbPool) -> Result<(), sea_orm::DbErr> {
    pool.ping().await
}

/// Apply all pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    Migrator::up(pool, None).await?;
    info!("migrations applied");
    Ok(())
}
