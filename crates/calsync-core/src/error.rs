//! Shared error types for calsync.
//!
//! Library crates keep their own typed errors (`CalendarError`, `SyncError`);
//! this module holds the pieces every crate needs:
//! - configuration and local database failures
//! - a top-level `AppError` for executables, with UI-safe messages

use thiserror::Error;

/// Top-level error type for calsync executables.
///
/// Use `user_message()` to get a message suitable for printing to a terminal.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0:#}")]
    Other(anyhow::Error),
}

/// Recover the typed cause of an `anyhow` error from a store or loader, so
/// `user_message()` can describe it.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<DatabaseError>() {
            Ok(e) => return AppError::Database(e),
            Err(err) => err,
        };
        let err = match err.downcast::<ConfigError>() {
            Ok(e) => return AppError::Config(e),
            Err(err) => err,
        };
        match err.downcast::<std::io::Error>() {
            Ok(e) => AppError::Io(e),
            Err(err) => AppError::Other(err),
        }
    }
}

impl AppError {
    /// Returns a short, non-technical message.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Database(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Database/storage errors (SQLite mapping store).
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed(_) => {
                "Unable to open the event mapping database. Check the storage path."
            }
            DatabaseError::QueryFailed(_) => "A mapping store operation failed. Please try again.",
            DatabaseError::ConstraintViolation(_) => {
                "A mapping value was rejected by the database."
            }
            DatabaseError::Corruption(_) => {
                "The mapping database may be corrupted. Consider deleting it."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Failed to write configuration: {0}")]
    WriteFailed(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::WriteFailed(_) => "Could not save the configuration file.",
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_database_error(self) -> DatabaseError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_database_error(self) -> DatabaseError {
        match &self {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DatabaseError::ConstraintViolation(self.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::CannotOpen =>
            {
                DatabaseError::ConnectionFailed(self.to_string())
            }
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                DatabaseError::Corruption(self.to_string())
            }
            _ => DatabaseError::QueryFailed(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let err: AppError = ConfigError::Invalid("calendar.login_url".into()).into();
        assert!(matches!(err, AppError::Config(ConfigError::Invalid(_))));
        assert_eq!(
            err.user_message(),
            "Invalid configuration. Check your settings."
        );
    }

    #[test]
    fn test_anyhow_database_error_keeps_its_type() {
        use anyhow::Context;

        let err = Err::<(), _>(DatabaseError::ConnectionFailed("unable to open".into()))
            .context("Failed to open mapping store at /nowhere/mappings.db")
            .unwrap_err();

        let err = AppError::from(err);
        assert!(matches!(err, AppError::Database(DatabaseError::ConnectionFailed(_))));
        assert_eq!(
            err.user_message(),
            "Unable to open the event mapping database. Check the storage path."
        );
    }

    #[test]
    fn test_anyhow_io_error_keeps_its_type() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = AppError::from(anyhow::Error::new(io).context("Failed to create /data"));
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn test_anyhow_other_error() {
        let err = AppError::from(anyhow::anyhow!("record id out of range"));
        assert!(matches!(err, AppError::Other(_)));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_query_failure_mapping() {
        let err = rusqlite::Error::QueryReturnedNoRows.into_database_error();
        assert!(matches!(err, DatabaseError::QueryFailed(_)));
    }

    #[test]
    fn test_constraint_mapping() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("CHECK constraint failed: owner_id >= 0".into()),
        )
        .into_database_error();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }
}
