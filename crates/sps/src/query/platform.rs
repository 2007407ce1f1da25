//! Database platform policy.
//!
//! Identifies the target backend and owns everything that differs between
//! them: SQL rendering, identifier quoting, placeholder style, null ordering
//! and parameter type tags.
//!
//! Only backends sea-query can render are supported. Oracle, which also
//! takes explicit `NULLS FIRST`/`NULLS LAST`, and SQL Server are rejected by
//! [`Platform::from_name`].

use sea_query::{
    MysqlQueryBuilder, NullOrdering, PostgresQueryBuilder, QueryStatementWriter, SelectStatement,
    SqliteQueryBuilder,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::SortDirection;
use crate::error::{SpsError, SpsResult};
use crate::filter::value::{ParamValue, Parameters};

/// Supported database platforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Postgres,
    /// MySQL and MariaDB.
    MySql,
    Sqlite,
}

/// Binding type of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Null,
    Integer,
    Boolean,
    Float,
    String,
    IntegerList,
    StringList,
}

impl ParamType {
    /// Infer the binding type. Lists of anything but integers bind as strings.
    pub fn of(value: &ParamValue) -> Self {
        match value {
            ParamValue::Null => ParamType::Null,
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Boolean(_) => ParamType::Boolean,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::String(_) => ParamType::String,
            ParamValue::List(items) => {
                if items.iter().all(|i| matches!(i, ParamValue::Integer(_))) {
                    ParamType::IntegerList
                } else {
                    ParamType::StringList
                }
            }
        }
    }
}

/// SQL with positional placeholders and the values to bind, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<ParamValue>,
}

impl Platform {
    /// Resolve a platform name as found in configuration.
    pub fn from_name(name: &str) -> SpsResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pgsql" => Ok(Platform::Postgres),
            "mysql" | "mariadb" => Ok(Platform::MySql),
            "sqlite" => Ok(Platform::Sqlite),
            other => Err(SpsError::configuration(format!(
                "database platform \"{other}\" is not supported"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Postgres => "postgresql",
            Platform::MySql => "mysql",
            Platform::Sqlite => "sqlite",
        }
    }

    /// Quote an identifier the way sea-query quotes aliases for this
    /// platform, doubling embedded quote characters.
    pub fn quote_identifier(self, name: &str) -> String {
        let quote = match self {
            Platform::MySql => '`',
            Platform::Postgres | Platform::Sqlite => '"',
        };
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push(quote);
        for c in name.chars() {
            if c == quote {
                quoted.push(quote);
            }
            quoted.push(c);
        }
        quoted.push(quote);
        quoted
    }

    /// Explicit null placement for a sort direction, if the platform needs one.
    pub fn null_ordering(self, direction: SortDirection) -> Option<NullOrdering> {
        match (self, direction) {
            (Platform::Postgres, SortDirection::Asc) => Some(NullOrdering::First),
            (Platform::Postgres, SortDirection::Desc) => Some(NullOrdering::Last),
            _ => None,
        }
    }

    /// Backend type name used when binding `value`.
    pub fn type_tag(self, value: &ParamValue) -> &'static str {
        let ty = ParamType::of(value);
        match self {
            Platform::Postgres => match ty {
                ParamType::Null => "NULL",
                ParamType::Integer => "INT8",
                ParamType::Boolean => "BOOL",
                ParamType::Float => "FLOAT8",
                ParamType::String => "TEXT",
                ParamType::IntegerList => "INT8[]",
                ParamType::StringList => "TEXT[]",
            },
            Platform::MySql => match ty {
                ParamType::Null => "NULL",
                ParamType::Integer | ParamType::IntegerList => "BIGINT",
                ParamType::Boolean => "BOOLEAN",
                ParamType::Float => "DOUBLE",
                ParamType::String | ParamType::StringList => "VARCHAR",
            },
            Platform::Sqlite => match ty {
                ParamType::Null => "NULL",
                ParamType::Integer | ParamType::Boolean | ParamType::IntegerList => "INTEGER",
                ParamType::Float => "REAL",
                ParamType::String | ParamType::StringList => "TEXT",
            },
        }
    }

    /// Render a statement in this platform's dialect.
    pub fn render(self, statement: &SelectStatement) -> String {
        match self {
            Platform::Postgres => statement.to_string(PostgresQueryBuilder),
            Platform::MySql => statement.to_string(MysqlQueryBuilder),
            Platform::Sqlite => statement.to_string(SqliteQueryBuilder),
        }
    }

    /// Replace `:name` placeholders that appear in `params` with positional
    /// ones (`$1` or `?`), expanding list values into one slot per element.
    ///
    /// Quoted text and `::` casts are left untouched.
    pub fn bind(self, sql: &str, params: &Parameters) -> BoundStatement {
        let mut out = String::with_capacity(sql.len());
        let mut values = Vec::new();
        let mut chars = sql.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '\'' | '"' | '`' => {
                    out.push(c);
                    for (_, q) in chars.by_ref() {
                        out.push(q);
                        if q == c {
                            break;
                        }
                    }
                }
                ':' => {
                    if let Some(&(_, ':')) = chars.peek() {
                        chars.next();
                        out.push_str("::");
                        continue;
                    }
                    let start = i + 1;
                    let mut end = start;
                    while let Some(&(j, n)) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            end = j + n.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let name = &sql[i..end];
                    match params.get(name) {
                        Some(value) if end > start => self.push_value(value, &mut out, &mut values),
                        _ => out.push_str(name),
                    }
                }
                _ => out.push(c),
            }
        }

        BoundStatement {
            sql: out,
            params: values,
        }
    }

    fn push_value(self, value: &ParamValue, out: &mut String, values: &mut Vec<ParamValue>) {
        match value {
            ParamValue::List(items) if items.is_empty() => out.push_str("NULL"),
            ParamValue::List(items) => {
                for (n, item) in items.iter().enumerate() {
                    if n > 0 {
                        out.push_str(", ");
                    }
                    self.push_placeholder(out, values.len() + 1);
                    values.push(item.clone());
                }
            }
            scalar => {
                self.push_placeholder(out, values.len() + 1);
                values.push(scalar.clone());
            }
        }
    }

    fn push_placeholder(self, out: &mut String, position: usize) {
        match self {
            Platform::Postgres => {
                out.push('$');
                out.push_str(&position.to_string());
            }
            Platform::MySql | Platform::Sqlite => out.push('?'),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Parameters {
        let mut params = Parameters::new();
        params.insert(":age_1", ParamValue::Integer(30));
        params.insert(
            ":id_2",
            ParamValue::List(vec![ParamValue::Integer(4), ParamValue::Integer(5)]),
        );
        params.insert(":name_3", ParamValue::from("%a%"));
        params
    }

    #[test]
    fn platform_names() {
        assert_eq!(Platform::from_name("PostgreSQL").unwrap(), Platform::Postgres);
        assert_eq!(Platform::from_name("pgsql").unwrap(), Platform::Postgres);
        assert_eq!(Platform::from_name("mariadb").unwrap(), Platform::MySql);
        assert_eq!(Platform::from_name("sqlite").unwrap(), Platform::Sqlite);
        for unsupported in ["oracle", "sqlserver"] {
            assert!(matches!(
                Platform::from_name(unsupported),
                Err(SpsError::Configuration(_))
            ));
        }
    }

    #[test]
    fn postgres_binding_numbers_and_expands() {
        let bound = Platform::Postgres.bind(
            "WHERE t.age > :age_1 AND t.id IN(:id_2) AND t.name LIKE :name_3",
            &params(),
        );
        assert_eq!(
            bound.sql,
            "WHERE t.age > $1 AND t.id IN($2, $3) AND t.name LIKE $4"
        );
        assert_eq!(
            bound.params,
            vec![
                ParamValue::Integer(30),
                ParamValue::Integer(4),
                ParamValue::Integer(5),
                ParamValue::from("%a%"),
            ]
        );
    }

    #[test]
    fn question_mark_placeholders() {
        let bound = Platform::Sqlite.bind("a = :age_1 OR b IN(:id_2)", &params());
        assert_eq!(bound.sql, "a = ? OR b IN(?, ?)");
        assert_eq!(bound.params.len(), 3);
    }

    #[test]
    fn quotes_casts_and_unknown_names_untouched() {
        let bound = Platform::Postgres.bind(
            "x::text = ':age_1' AND \"col:age_1\" = :age_1 AND y = :other",
            &params(),
        );
        assert_eq!(
            bound.sql,
            "x::text = ':age_1' AND \"col:age_1\" = $1 AND y = :other"
        );
        assert_eq!(bound.params, vec![ParamValue::Integer(30)]);
    }

    #[test]
    fn repeated_names_bind_twice() {
        let bound = Platform::Postgres.bind("a > :age_1 AND b > :age_1", &params());
        assert_eq!(bound.sql, "a > $1 AND b > $2");
        assert_eq!(bound.params.len(), 2);
    }

    #[test]
    fn identifier_quoting_matches_rendered_aliases() {
        let mut select = sea_query::Query::select();
        select.expr_as(sea_query::Expr::cust("1"), sea_query::Alias::new("cityCnt"));
        for platform in [Platform::Postgres, Platform::MySql, Platform::Sqlite] {
            let sql = platform.render(&select);
            let quoted = platform.quote_identifier("cityCnt");
            assert!(sql.ends_with(&format!("AS {quoted}")), "{sql}");
        }
        assert_eq!(Platform::Postgres.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Platform::MySql.quote_identifier("cnt"), "`cnt`");
    }

    #[test]
    fn null_ordering_only_on_postgres() {
        assert_eq!(
            Platform::Postgres.null_ordering(SortDirection::Asc),
            Some(NullOrdering::First)
        );
        assert_eq!(
            Platform::Postgres.null_ordering(SortDirection::Desc),
            Some(NullOrdering::Last)
        );
        assert_eq!(Platform::MySql.null_ordering(SortDirection::Asc), None);
    }

    #[test]
    fn type_tags() {
        assert_eq!(ParamType::of(&ParamValue::Integer(1)), ParamType::Integer);
        assert_eq!(
            ParamType::of(&ParamValue::List(vec![ParamValue::from("a")])),
            ParamType::StringList
        );
        assert_eq!(Platform::Postgres.type_tag(&ParamValue::Boolean(true)), "BOOL");
        assert_eq!(Platform::MySql.type_tag(&ParamValue::from("x")), "VARCHAR");
        assert_eq!(Platform::Sqlite.type_tag(&ParamValue::Float(1.5)), "REAL");
    }
}
