//! Request and response types for list queries.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::FieldOptions;
use crate::error::{SpsError, SpsResult};
use crate::query::skeleton::QuerySkeleton;

/// One result row, keyed by output alias.
pub type Row = serde_json::Map<String, JsonValue>;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `asc`/`desc` in any case; missing means ascending.
    pub fn parse(field: &str, direction: Option<&str>) -> SpsResult<Self> {
        match direction.map(str::trim) {
            None | Some("") => Ok(SortDirection::Asc),
            Some(d) if d.eq_ignore_ascii_case("asc") => Ok(SortDirection::Asc),
            Some(d) if d.eq_ignore_ascii_case("desc") => Ok(SortDirection::Desc),
            Some(d) => Err(SpsError::validation(format!(
                "sort direction \"{d}\" for \"{field}\" must be \"asc\" or \"desc\""
            ))),
        }
    }

    pub fn to_order(self) -> sea_query::Order {
        match self {
            SortDirection::Asc => sea_query::Order::Asc,
            SortDirection::Desc => sea_query::Order::Desc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

/// A client sort directive.
///
/// Accepts `"name"`, `["name", "desc"]` or `{"field": "name", "direction": "desc"}`.
/// The direction stays raw until the query validates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SortSpecRepr")]
pub struct SortSpec {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Some("asc".to_string()),
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Some("desc".to_string()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SortSpecRepr {
    Field(String),
    Pair(Vec<String>),
    Object {
        field: String,
        #[serde(default)]
        direction: Option<String>,
    },
}

impl TryFrom<SortSpecRepr> for SortSpec {
    type Error = String;

    fn try_from(repr: SortSpecRepr) -> Result<Self, Self::Error> {
        match repr {
            SortSpecRepr::Field(field) => Ok(Self {
                field,
                direction: None,
            }),
            SortSpecRepr::Object { field, direction } => Ok(Self { field, direction }),
            SortSpecRepr::Pair(parts) => {
                let mut parts = parts.into_iter();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(field), direction, None) => Ok(Self { field, direction }),
                    _ => Err("sort pair must be [field] or [field, direction]".to_string()),
                }
            }
        }
    }
}

/// Paging options of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u64,

    /// Page size; the list's configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_per_page: Option<u64>,

    /// Return navigation metadata with the rows.
    #[serde(default = "default_true")]
    pub navigation: bool,

    /// Count all matching rows when navigation is on.
    #[serde(default)]
    pub total_count: bool,
}

fn default_page() -> u64 {
    1
}

pub(crate) fn default_items_per_page() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            items_per_page: None,
            navigation: true,
            total_count: false,
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, items_per_page: u64) -> Self {
        Self {
            page,
            items_per_page: Some(items_per_page),
            ..Default::default()
        }
    }

    pub fn with_total_count(mut self) -> Self {
        self.total_count = true;
        self
    }

    pub fn without_navigation(mut self) -> Self {
        self.navigation = false;
        self
    }
}

/// Everything a client sends for one list page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub filters: JsonValue,

    #[serde(default)]
    pub sort: Vec<SortSpec>,

    #[serde(flatten)]
    pub page: PageRequest,
}

/// A list definition: the skeleton plus field customization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDefinition {
    /// Overrides the configured platform.
    #[serde(default)]
    pub platform: Option<String>,

    pub skeleton: QuerySkeleton,

    #[serde(default)]
    pub fields: BTreeMap<String, FieldOptions>,

    /// Allow filtering only on these fields.
    #[serde(default)]
    pub filterable: Option<Vec<String>>,

    /// Allow sorting only on these fields.
    #[serde(default)]
    pub sortable: Option<Vec<String>>,
}

/// Paging metadata returned with a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    pub items_per_page: u64,
    pub page: u64,
    /// Another page follows this one.
    pub more: bool,
    pub items_on_page: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    pub data: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<Navigation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_spec_shapes() {
        let specs: Vec<SortSpec> =
            serde_json::from_value(json!(["name", ["id", "desc"], {"field": "cnt", "direction": "ASC"}]))
                .unwrap();
        assert_eq!(
            specs,
            vec![
                SortSpec {
                    field: "name".to_string(),
                    direction: None
                },
                SortSpec::desc("id"),
                SortSpec {
                    field: "cnt".to_string(),
                    direction: Some("ASC".to_string())
                },
            ]
        );
        assert!(serde_json::from_value::<SortSpec>(json!(["a", "b", "c"])).is_err());
    }

    #[test]
    fn sort_direction_parsing() {
        assert_eq!(SortDirection::parse("a", None).unwrap(), SortDirection::Asc);
        assert_eq!(
            SortDirection::parse("a", Some("DESC")).unwrap(),
            SortDirection::Desc
        );
        let err = SortDirection::parse("name", Some("sideways")).unwrap_err();
        assert!(matches!(err, SpsError::Validation(_)));
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn list_request_defaults() {
        let request: ListRequest = serde_json::from_value(json!({"page": 3})).unwrap();
        assert_eq!(request.page.page, 3);
        assert_eq!(request.page.items_per_page, None);
        assert!(request.page.navigation);
        assert!(!request.page.total_count);
        assert!(request.filters.is_null());
        assert!(request.sort.is_empty());
    }

    #[test]
    fn navigation_omits_missing_totals() {
        let result = ListResult {
            data: vec![],
            navigation: Some(Navigation {
                items_per_page: 5,
                page: 1,
                more: false,
                items_on_page: 0,
                total_items: None,
                total_pages: None,
            }),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["navigation"].get("total_items").is_none());
        assert_eq!(json["navigation"]["more"], json!(false));
    }
}
