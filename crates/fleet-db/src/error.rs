use thiserror::Error;

/// SQLSTATE reported when a transaction could not be serialized against
/// concurrent transactions and has to be run again from the start.
pub const SERIALIZATION_FAILURE: &str = "40001";

/// Errors produced by the pool, a connection, or row mapping.
///
/// Errors are cloneable and comparable so that the transaction executor can
/// hand back exactly the error it observed, without wrapping it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// The pool could not supply a connection.
    #[error("failed to acquire a database connection: {message}")]
    Acquire { message: String },
    /// The database rejected a statement, or the connection broke mid-statement.
    #[error("database error{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Database {
        code: Option<String>,
        message: String,
    },
    /// A returned row did not have the expected shape.
    #[error("failed to decode column `{column}`: {reason}")]
    Decode { column: String, reason: String },
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    Retryable,
    NonRetryable,
}

/// Decide whether a failed unit of work may be run again.
///
/// Only a serialization failure reported by the database is retryable;
/// connection acquisition failures, constraint violations and everything
/// else are final.
pub fn classify(error: &DbError) -> Retryability {
    match error {
        DbError::Database {
            code: Some(code), ..
        } if code == SERIALIZATION_FAILURE => Retryability::Retryable,
        _ => Retryability::NonRetryable,
    }
}

impl DbError {
    pub fn acquire(message: impl Into<String>) -> Self {
        Self::Acquire {
            message: message.into(),
        }
    }

    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn decode(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// SQLSTATE attached to the error, if the database reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        classify(self) == Retryability::Retryable
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self::Database {
                code: db.code().map(|code| code.into_owned()),
                message: db.message().to_string(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::acquire(err.to_string()),
            sqlx::Error::ColumnDecode { index, source } => Self::decode(index, source.to_string()),
            other => Self::Database {
                code: None,
                message: other.to_string(),
            },
        }
    }
}
