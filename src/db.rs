use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);
    // Every pooled connection to an in-memory SQLite database sees its own
    // empty database, so those must stay on a single connection.
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }
    let conn = Database::connect(options).await?;
    Ok(conn)
}

/// Apply the SQL files in `migrations/` through the pool backing the connection.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    let pool = conn.get_sqlite_connection_pool();
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
