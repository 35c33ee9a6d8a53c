use std::path::Path;
use std::time::Duration;

use pixvault_shared::error::VaultError;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use tracing::debug;

pub const DEFAULT_SLOW_QUERY_MS: u64 = 1000;

pub fn db_url(db_path: Option<&Path>) -> String {
    match db_path {
        Some(path) => format!("sqlite://{}?mode=rwc", path.display()),
        None => "sqlite::memory:".to_string(),
    }
}

/// Opens the connection pool. `None` gives a private in-memory database.
pub async fn connect(
    db_path: Option<&Path>,
    slow_query_ms: Option<u64>,
) -> Result<DatabaseConnection, VaultError> {
    let db_url = db_url(db_path);
    debug!("Opening Database: {db_url}");

    let mut options = ConnectOptions::new(db_url);
    options
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Trace)
        .sqlx_slow_statements_logging_settings(
            log::LevelFilter::Warn,
            Duration::from_millis(slow_query_ms.unwrap_or(DEFAULT_SLOW_QUERY_MS)),
        );

    match db_path {
        Some(_) => {
            options
                .max_connections(20)
                .min_connections(1)
                .idle_timeout(Duration::from_secs(30));
        }
        // every pooled connection would get its own empty database otherwise
        None => {
            options.max_connections(1).min_connections(1);
        }
    }

    let conn = Database::connect(options).await?;

    if db_path.is_some() {
        conn.execute_unprepared("PRAGMA journal_mode = WAL")
            .await
            .map_err(|err| VaultError::Configuration(format!("Failed to enable WAL: {err:?}")))?;
    }

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_url() {
        assert_eq!(db_url(None), "sqlite::memory:");
        assert_eq!(
            db_url(Some(Path::new("/tmp/pixvault.sqlite3"))),
            "sqlite:///tmp/pixvault.sqlite3?mode=rwc"
        );
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let conn = connect(None, None).await.expect("in-memory db opens");
        conn.execute_unprepared("SELECT 1")
            .await
            .expect("query runs");
    }

    #[tokio::test]
    async fn test_connect_unwritable_path() {
        let path = Path::new("/nonexistent-pixvault-dir/sub/db.sqlite3");
        connect(Some(path), None)
            .await
            .expect_err("Should fail to open DB");
    }
}
