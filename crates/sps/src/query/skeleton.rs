//! Declarative description of the base SELECT a list query runs against.
//!
//! The skeleton is supplied by the caller (usually loaded from a list
//! definition file) and rendered into a `sea_query::SelectStatement`. The
//! select list, join conditions, static conditions and grouping are raw SQL
//! fragments owned by the caller; client input never reaches them.

use sea_query::{Alias, ConditionalStatement, Expr, IntoIden, Query, SelectStatement, TableRef};
use serde::{Deserialize, Serialize};

use crate::catalog::extract_field_and_alias;
use crate::error::{SpsError, SpsResult};

/// Join type for skeleton joins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
}

impl From<JoinType> for sea_query::JoinType {
    fn from(join_type: JoinType) -> Self {
        match join_type {
            JoinType::Inner => sea_query::JoinType::InnerJoin,
            JoinType::Left => sea_query::JoinType::LeftJoin,
            JoinType::Right => sea_query::JoinType::RightJoin,
        }
    }
}

/// A joined table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonJoin {
    #[serde(default)]
    pub join_type: JoinType,
    pub table: String,
    #[serde(default)]
    pub alias: Option<String>,
    /// Raw join condition, e.g. `capital.id = country.capital_id`.
    pub on: String,
}

/// Base query: select list, source tables, static conditions, grouping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySkeleton {
    /// Select-list entries such as `country.name AS country_name`.
    pub select: Vec<String>,
    pub from: String,
    #[serde(default)]
    pub from_alias: Option<String>,
    #[serde(default)]
    pub joins: Vec<SkeletonJoin>,
    /// Conditions always ANDed onto the query.
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub group_by: Vec<String>,
}

impl QuerySkeleton {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Default::default()
        }
    }

    pub fn from_alias(mut self, alias: impl Into<String>) -> Self {
        self.from_alias = Some(alias.into());
        self
    }

    pub fn select(mut self, column: impl Into<String>) -> Self {
        self.select.push(column.into());
        self
    }

    pub fn join(
        mut self,
        join_type: JoinType,
        table: impl Into<String>,
        alias: Option<&str>,
        on: impl Into<String>,
    ) -> Self {
        self.joins.push(SkeletonJoin {
            join_type,
            table: table.into(),
            alias: alias.map(str::to_string),
            on: on.into(),
        });
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn group_by(mut self, expression: impl Into<String>) -> Self {
        self.group_by.push(expression.into());
        self
    }

    /// Declared output columns as `(alias, expression)`, in select order.
    pub fn columns(&self) -> SpsResult<Vec<(String, String)>> {
        self.select
            .iter()
            .map(|entry| extract_field_and_alias(entry).map(|(expr, alias)| (alias, expr)))
            .collect()
    }

    /// Render the skeleton as a sea-query statement.
    pub fn to_statement(&self) -> SpsResult<SelectStatement> {
        if self.from.trim().is_empty() {
            return Err(SpsError::configuration("query skeleton has no FROM table"));
        }
        if self.select.is_empty() {
            return Err(SpsError::configuration("query skeleton selects no columns"));
        }

        let mut query = Query::select();

        for (alias, expression) in self.columns()? {
            query.expr_as(Expr::cust(expression), Alias::new(alias));
        }

        match self.from_alias.as_deref() {
            Some(alias) => {
                query.from_as(table_ref(&self.from), Alias::new(alias));
            }
            None => {
                query.from(table_ref(&self.from));
            }
        }

        for join in &self.joins {
            match join.alias.as_deref() {
                Some(alias) => {
                    query.join_as(
                        join.join_type.into(),
                        table_ref(&join.table),
                        Alias::new(alias),
                        Expr::cust(join.on.clone()),
                    );
                }
                None => {
                    query.join(
                        join.join_type.into(),
                        table_ref(&join.table),
                        Expr::cust(join.on.clone()),
                    );
                }
            }
        }

        for condition in &self.conditions {
            query.and_where(Expr::cust(condition.clone()));
        }

        if !self.group_by.is_empty() {
            query.add_group_by(self.group_by.iter().map(|g| Expr::cust(g.clone())));
        }

        Ok(query)
    }
}

/// `schema.table` or `table`.
fn table_ref(name: &str) -> TableRef {
    match name.trim().split_once('.') {
        Some((schema, table)) => {
            TableRef::SchemaTable(Alias::new(schema).into_iden(), Alias::new(table).into_iden())
        }
        None => TableRef::Table(Alias::new(name.trim()).into_iden()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::PostgresQueryBuilder;

    fn skeleton() -> QuerySkeleton {
        QuerySkeleton::new("country")
            .select("country.id AS id")
            .select("country.name country_name")
            .select("capital.name AS capital_name")
            .join(
                JoinType::Left,
                "city",
                Some("capital"),
                "capital.id = country.capital_id",
            )
    }

    #[test]
    fn columns_in_select_order() {
        assert_eq!(
            skeleton().columns().unwrap(),
            vec![
                ("id".to_string(), "country.id".to_string()),
                ("country_name".to_string(), "country.name".to_string()),
                ("capital_name".to_string(), "capital.name".to_string()),
            ]
        );
    }

    #[test]
    fn renders_joins_and_aliases() {
        let sql = skeleton()
            .to_statement()
            .unwrap()
            .to_string(PostgresQueryBuilder);
        assert!(sql.starts_with("SELECT country.id AS \"id\""));
        assert!(sql.contains("FROM \"country\""));
        assert!(sql.contains("LEFT JOIN \"city\" AS \"capital\" ON"));
        assert!(sql.contains("capital.id = country.capital_id"));
    }

    #[test]
    fn renders_conditions_and_grouping() {
        let sql = skeleton()
            .condition("country.continent = 'Europe'")
            .group_by("country.id")
            .to_statement()
            .unwrap()
            .to_string(PostgresQueryBuilder);
        assert!(sql.contains("WHERE country.continent = 'Europe'"));
        assert!(sql.ends_with("GROUP BY country.id"));
    }

    #[test]
    fn schema_qualified_table() {
        let sql = QuerySkeleton::new("geo.country")
            .select("country.id")
            .to_statement()
            .unwrap()
            .to_string(PostgresQueryBuilder);
        assert!(sql.contains("FROM \"geo\".\"country\""));
    }

    #[test]
    fn empty_skeleton_is_configuration_error() {
        assert!(matches!(
            QuerySkeleton::new("").select("a").to_statement(),
            Err(SpsError::Configuration(_))
        ));
        assert!(QuerySkeleton::new("t").to_statement().is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{
            "select": ["country.id AS id"],
            "from": "country",
            "joins": [{"table": "city", "alias": "c", "on": "c.country_id = country.id"}]
        }"#;
        let skeleton: QuerySkeleton = serde_json::from_str(json).unwrap();
        assert_eq!(skeleton.joins[0].join_type, JoinType::Inner);
        assert!(skeleton.group_by.is_empty());
    }
}
