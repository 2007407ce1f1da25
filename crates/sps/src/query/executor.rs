//! Query execution.
//!
//! [`QueryExecutor`] is the seam between the compiler and the database.
//! [`PgExecutor`] runs bound statements on PostgreSQL through sqlx, reading
//! each row back as a JSON object.
//!
//! sqlx sends every parameter in binary format with a declared type, so a
//! string bound next to a `date` or `timestamp` column would be decoded by
//! the wrong type receiver. [`inline_text_literals`] writes string values
//! into the SQL as untyped literals instead, leaving PostgreSQL to infer
//! their type from the column they are compared with.

use async_trait::async_trait;
use sea_query::{PostgresQueryBuilder, QueryBuilder};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::QueryScalar;
use std::time::Duration;

use super::platform::BoundStatement;
use super::types::Row;
use crate::filter::value::ParamValue;

/// Runs bound statements.
///
/// Implementations must not retry; errors are passed through unchanged.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a page query and return its rows keyed by output alias.
    async fn fetch_rows(&self, statement: &BoundStatement) -> Result<Vec<Row>, sqlx::Error>;

    /// Run a `COUNT(*)` query.
    async fn fetch_count(&self, statement: &BoundStatement) -> Result<i64, sqlx::Error>;
}

/// PostgreSQL executor backed by a connection pool.
#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Abort statements running longer than `timeout`.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        if let Some(timeout) = self.statement_timeout {
            // SET LOCAL resets when the transaction ends.
            sqlx::query(&format!(
                "SET LOCAL statement_timeout = '{}ms'",
                timeout.as_millis()
            ))
            .execute(&mut *tx)
            .await?;
        }
        Ok(tx)
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn fetch_rows(&self, statement: &BoundStatement) -> Result<Vec<Row>, sqlx::Error> {
        let statement = inline_text_literals(statement);
        let sql = format!("SELECT row_to_json(t) FROM ({}) t", statement.sql);
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "fetching rows");

        let mut tx = self.begin().await?;
        let values: Vec<JsonValue> = bind_all(sqlx::query_scalar(&sql), &statement.params)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        values
            .into_iter()
            .map(|value| match value {
                JsonValue::Object(row) => Ok(row),
                other => Err(sqlx::Error::Protocol(format!(
                    "expected a JSON object per row, got {other}"
                ))),
            })
            .collect()
    }

    async fn fetch_count(&self, statement: &BoundStatement) -> Result<i64, sqlx::Error> {
        let statement = inline_text_literals(statement);
        tracing::debug!(sql = %statement.sql, "counting rows");

        let mut tx = self.begin().await?;
        let total: i64 = bind_all(sqlx::query_scalar(&statement.sql), &statement.params)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(total)
    }
}

/// Replace `$n` placeholders holding strings with escaped, untyped literals
/// and renumber the rest.
///
/// Quoted text and identifiers are copied unchanged.
pub fn inline_text_literals(statement: &BoundStatement) -> BoundStatement {
    let sql = &statement.sql;
    let mut out = String::with_capacity(sql.len());
    let mut params = Vec::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                for (_, q) in chars.by_ref() {
                    out.push(q);
                    if q == c {
                        break;
                    }
                }
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        end = j + 1;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let param = sql[start..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|n| statement.params.get(n));
                match param {
                    Some(ParamValue::String(s)) => {
                        let literal = sea_query::Value::from(s.as_str());
                        out.push_str(&PostgresQueryBuilder.value_to_string(&literal));
                    }
                    Some(value) => {
                        params.push(value.clone());
                        out.push('$');
                        out.push_str(&params.len().to_string());
                    }
                    None => out.push_str(&sql[i..end]),
                }
            }
            _ => out.push(c),
        }
    }

    BoundStatement { sql: out, params }
}

fn bind_all<'q, O>(
    mut query: QueryScalar<'q, Postgres, O, PgArguments>,
    params: &'q [ParamValue],
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    for param in params {
        query = match param {
            ParamValue::Null => query.bind(None::<String>),
            ParamValue::Boolean(b) => query.bind(*b),
            ParamValue::Integer(i) => query.bind(*i),
            ParamValue::Float(f) => query.bind(*f),
            ParamValue::String(s) => query.bind(s.as_str()),
            // Lists are expanded when binding; one left over goes in as JSON.
            ParamValue::List(_) => query.bind(serde_json::to_value(param).unwrap_or_default()),
        };
    }
    query
}
