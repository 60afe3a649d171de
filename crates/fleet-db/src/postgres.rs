//! [`ConnectionPool`] and [`Connection`] backed by sqlx's Postgres driver.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    Column, PgPool, Postgres, Row as _, TypeInfo,
    pool::PoolConnection,
    postgres::{PgArguments, PgRow},
    query::Query,
};
use uuid::Uuid;

use crate::{
    error::DbError,
    pool::{Connection, ConnectionPool, QueryResult, Row, SqlValue},
};

#[async_trait]
impl ConnectionPool for PgPool {
    type Connection = PoolConnection<Postgres>;

    async fn acquire(&self) -> Result<Self::Connection, DbError> {
        sqlx::Pool::acquire(self)
            .await
            .map_err(|e| DbError::acquire(e.to_string()))
    }
}

#[async_trait]
impl Connection for PoolConnection<Postgres> {
    async fn execute(
        &mut self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DbError> {
        let rows = params
            .iter()
            .fold(sqlx::query(statement), bind_value)
            .fetch_all(&mut **self)
            .await?;

        rows.iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map(QueryResult::new)
    }

    fn discard(&mut self) {
        self.close_on_drop();
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value.clone() {
        SqlValue::Int(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Uuid(v) => query.bind(v),
        SqlValue::Timestamp(v) => query.bind(v),
    }
}

fn decode_row(row: &PgRow) -> Result<Row, DbError> {
    let mut decoded = Row::new();

    for column in row.columns() {
        let name = column.name();
        let index = column.ordinal();
        let value = match column.type_info().name() {
            "INT2" => SqlValue::Int(row.try_get::<Option<i16>, _>(index)?.map(i32::from)),
            "INT4" => SqlValue::Int(row.try_get::<Option<i32>, _>(index)?),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                SqlValue::Text(row.try_get::<Option<String>, _>(index)?)
            }
            "UUID" => SqlValue::Uuid(row.try_get::<Option<Uuid>, _>(index)?),
            "TIMESTAMPTZ" => {
                SqlValue::Timestamp(row.try_get::<Option<DateTime<Utc>>, _>(index)?)
            }
            other => {
                return Err(DbError::decode(
                    name,
                    format!("unsupported column type {other}"),
                ));
            }
        };
        decoded.set(name, value);
    }

    Ok(decoded)
}
