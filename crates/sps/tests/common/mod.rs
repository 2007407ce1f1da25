#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`MemoryExecutor`] stands in for the database: it holds a fixed table of
//! rows, honours the LIMIT/OFFSET of page statements, answers counts with the
//! table size, and records every statement it receives.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use sps::{BoundStatement, ListDefinition, ListQuery, Platform, QueryExecutor, Row};

/// In-memory executor over a fixed set of rows.
#[derive(Default)]
pub struct MemoryExecutor {
    rows: Vec<Row>,
    fail: bool,
    pages: Mutex<Vec<BoundStatement>>,
    counts: Mutex<Vec<BoundStatement>>,
}

impl MemoryExecutor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    /// An executor whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn page_statements(&self) -> Vec<BoundStatement> {
        self.pages.lock().unwrap().clone()
    }

    pub fn count_statements(&self) -> Vec<BoundStatement> {
        self.counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn fetch_rows(&self, statement: &BoundStatement) -> Result<Vec<Row>, sqlx::Error> {
        self.pages.lock().unwrap().push(statement.clone());
        if self.fail {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let limit = clause_value(&statement.sql, "LIMIT").unwrap_or(self.rows.len());
        let offset = clause_value(&statement.sql, "OFFSET").unwrap_or(0);
        Ok(self.rows.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn fetch_count(&self, statement: &BoundStatement) -> Result<i64, sqlx::Error> {
        self.counts.lock().unwrap().push(statement.clone());
        if self.fail {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self.rows.len() as i64)
    }
}

/// Numeric argument of the last `keyword` clause in `sql`.
fn clause_value(sql: &str, keyword: &str) -> Option<usize> {
    let pattern = format!(" {keyword} ");
    let start = sql.rfind(&pattern)? + pattern.len();
    sql[start..]
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
}

/// The country listing from the shared fixtures.
pub fn country_list(platform: Platform) -> ListQuery {
    let definition: ListDefinition =
        serde_json::from_value(sps_test_utils::country_definition()).unwrap();
    ListQuery::from_definition(&definition, platform).unwrap()
}

/// Single-condition filter.
pub fn condition(property: &str, operator: &str, value: JsonValue) -> JsonValue {
    serde_json::json!({"collection": [
        {"property": property, "operator": operator, "value": value}
    ]})
}
