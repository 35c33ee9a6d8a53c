use std::fmt;

use sea_orm::{DbErr, RuntimeErr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    Configuration(String),
    IOError(String),
    /// The input bytes couldn't be decoded as a supported raster image
    Decode(String),
    /// Bad id or metadata, rejected before any processing
    Validation(String),
    NotFound(String),
    /// Connection / timeout class failure, safe to retry
    TransientStore(String),
    /// The named column doesn't exist in the current schema
    SchemaMismatch(String),
    Database(String),
    Other(String),
}

impl VaultError {
    pub fn is_transient(&self) -> bool {
        matches!(self, VaultError::TransientStore(_))
    }

    /// The column the store reported as missing, if that's what this is.
    pub fn missing_column(&self) -> Option<&str> {
        match self {
            VaultError::SchemaMismatch(column) => Some(column.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            VaultError::IOError(msg) => write!(f, "io error: {msg}"),
            VaultError::Decode(msg) => write!(f, "failed to decode image: {msg}"),
            VaultError::Validation(msg) => write!(f, "invalid input: {msg}"),
            VaultError::NotFound(msg) => write!(f, "not found: {msg}"),
            VaultError::TransientStore(msg) => write!(f, "store temporarily unavailable: {msg}"),
            VaultError::SchemaMismatch(column) => write!(f, "column {column} does not exist"),
            VaultError::Database(msg) => write!(f, "database error: {msg}"),
            VaultError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for VaultError {}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::IOError(err.to_string())
    }
}

impl From<sqlx::Error> for VaultError {
    fn from(err: sqlx::Error) -> Self {
        let message = err.to_string();
        classify_sqlx(&err, message)
    }
}

impl From<DbErr> for VaultError {
    fn from(err: DbErr) -> Self {
        let message = err.to_string();
        match &err {
            DbErr::ConnectionAcquire(_) => VaultError::TransientStore(message),
            DbErr::Conn(RuntimeErr::SqlxError(inner))
            | DbErr::Exec(RuntimeErr::SqlxError(inner))
            | DbErr::Query(RuntimeErr::SqlxError(inner)) => classify_sqlx(inner, message),
            DbErr::Conn(_) => VaultError::TransientStore(message),
            DbErr::RecordNotFound(msg) => VaultError::NotFound(msg.clone()),
            _ => VaultError::Database(message),
        }
    }
}

fn classify_sqlx(err: &sqlx::Error, message: String) -> VaultError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => VaultError::TransientStore(message),
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            if let Some(column) = missing_column(code.as_deref(), db_err.message()) {
                VaultError::SchemaMismatch(column)
            } else if is_busy(code.as_deref()) {
                VaultError::TransientStore(message)
            } else {
                VaultError::Database(message)
            }
        }
        _ => VaultError::Database(message),
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED and their extended codes, plus the Postgres
/// connection exception class.
fn is_busy(code: Option<&str>) -> bool {
    match code {
        Some(code) => {
            matches!(code, "5" | "6" | "261" | "262" | "517" | "773") || code.starts_with("08")
        }
        None => false,
    }
}

/// Pulls the column name out of a "column does not exist" failure.
///
/// SQLite reports `no such column: x` on reads and updates and
/// `table t has no column named x` on inserts, Postgres uses SQLSTATE 42703
/// with `column "x" does not exist`.
pub fn missing_column(code: Option<&str>, message: &str) -> Option<String> {
    let tail = if let Some((_, tail)) = message.split_once("no such column: ") {
        tail
    } else if let Some((_, tail)) = message.split_once("has no column named ") {
        tail
    } else if code == Some("42703") {
        message
            .split_once("column ")
            .map(|(_, tail)| tail)
            .unwrap_or(message)
    } else {
        return None;
    };

    let name = tail
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_matches('"')
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .trim_matches('"');

    match name.is_empty() {
        true => None,
        false => Some(name.to_string()),
    }
}
