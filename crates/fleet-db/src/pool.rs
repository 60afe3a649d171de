//! Connection pool and connection interfaces consumed by the transaction
//! executor and the repositories.
//!
//! A connection is released by dropping it, so every lease is scoped: the
//! connection goes back to its pool on every exit path, and a lease that was
//! never acquired has nothing to release.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbError;

/// Hands out exclusive, reusable connections to the backing store.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    type Connection: Connection;

    /// Lease a connection. It is released when the returned value is dropped.
    async fn acquire(&self) -> Result<Self::Connection, DbError>;
}

/// A leased connection able to run parameterized statements.
#[async_trait]
pub trait Connection: Send {
    /// Run `statement` with `params` bound positionally (`$1`, `$2`, ...).
    async fn execute(
        &mut self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DbError>;

    /// Close the connection instead of returning it to the pool when the
    /// lease is dropped. Used when its session state is unknown.
    fn discard(&mut self) {}
}

/// A bind parameter or a column value.
///
/// Every variant carries its own nullability so that a `NULL` is still bound
/// with the column's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Int(Option<i32>),
    Text(Option<String>),
    Uuid(Option<Uuid>),
    Timestamp(Option<DateTime<Utc>>),
}

macro_rules! impl_sql_value {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for SqlValue {
            fn from(value: $ty) -> Self {
                Self::$variant(Some(value))
            }
        }

        impl From<Option<$ty>> for SqlValue {
            fn from(value: Option<$ty>) -> Self {
                Self::$variant(value)
            }
        }

        impl FromSqlValue for Option<$ty> {
            fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, DbError> {
                match value {
                    SqlValue::$variant(inner) => Ok(inner.clone()),
                    other => Err(DbError::decode(
                        column,
                        format!("expected {}, found {other:?}", stringify!($variant)),
                    )),
                }
            }
        }

        impl FromSqlValue for $ty {
            fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, DbError> {
                Option::<$ty>::from_sql_value(column, value)?
                    .ok_or_else(|| DbError::decode(column, "unexpected NULL"))
            }
        }
    };
}

/// Conversion from a column value into a Rust type.
pub trait FromSqlValue: Sized {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, DbError>;
}

impl_sql_value!(i32, Int);
impl_sql_value!(String, Text);
impl_sql_value!(Uuid, Uuid);
impl_sql_value!(DateTime<Utc>, Timestamp);

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(Some(value.to_owned()))
    }
}

/// One returned row, with its columns in select order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set `column`, replacing any previous value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn value(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Decode `column` as `T`.
    pub fn get<T: FromSqlValue>(&self, column: &str) -> Result<T, DbError> {
        let value = self
            .value(column)
            .ok_or_else(|| DbError::decode(column, "column not present in row"))?;
        T::from_sql_value(column, value)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Rows returned by a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The row of a statement expected to return at most one row.
    pub fn into_single_row(self) -> Option<Row> {
        if self.rows.len() == 1 {
            self.rows.into_iter().next()
        } else {
            None
        }
    }
}
