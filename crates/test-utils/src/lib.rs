//! sps test utilities.
//!
//! Fixtures for integration testing: the country listing definition, a
//! representative nested filter, result row builders, and assertion helpers
//! for rendered SQL.

use serde_json::{Map, Value as JsonValue, json};

/// Select list of the country listing, in output order.
pub const COUNTRY_SELECT: [&str; 7] = [
    "country.id AS id",
    "country.name AS country_name",
    "continent.name AS continent_name",
    "region.name AS region_name",
    "capital.name AS capital_name",
    "capital.last_date AS capital_last_date",
    "COUNT(city.id) AS city_cnt",
];

/// Country listing skeleton: countries with continent, region, capital and
/// a city count.
pub fn country_skeleton() -> JsonValue {
    json!({
        "select": COUNTRY_SELECT,
        "from": "country",
        "joins": [
            {"join_type": "left", "table": "continent", "alias": "continent", "on": "country.continent_id = continent.id"},
            {"join_type": "left", "table": "region", "alias": "region", "on": "country.region_id = region.id"},
            {"join_type": "left", "table": "city", "alias": "capital", "on": "country.capital_city_id = capital.id"},
            {"join_type": "left", "table": "city", "alias": "city", "on": "city.country_id = country.id"}
        ],
        "group_by": ["country.id", "continent.id", "region.id", "capital.id"]
    })
}

/// List definition for the country listing.
///
/// Names are compared lower-cased and `city_cnt` is aggregated.
pub fn country_definition() -> JsonValue {
    json!({
        "skeleton": country_skeleton(),
        "fields": {
            "country_name": {"lower_cased": true},
            "continent_name": {"lower_cased": true},
            "region_name": {"lower_cased": true},
            "capital_name": {"lower_cased": true},
            "city_cnt": {"aggregated": true}
        }
    })
}

/// Nested filter touching plain, lower-cased and aggregated fields.
pub fn country_filter() -> JsonValue {
    json!({
        "collection": [
            {
                "bool_operator": null,
                "condition": {
                    "property": "region_name",
                    "operator": "in",
                    "value": ["south america", "australia and new zealand"]
                }
            },
            {
                "bool_operator": "and",
                "collection": [
                    {
                        "bool_operator": null,
                        "condition": {
                            "property": "capital_last_date",
                            "operator": "between",
                            "value": ["1987-05-09", "2000-01-01"]
                        }
                    },
                    {
                        "bool_operator": "or",
                        "condition": {
                            "property": "country_name",
                            "operator": "contains",
                            "value": "islands"
                        }
                    }
                ]
            },
            {
                "bool_operator": "and",
                "collection": [
                    {
                        "bool_operator": null,
                        "condition": {
                            "property": "city_cnt",
                            "operator": "greater_than",
                            "value": 3
                        }
                    }
                ]
            }
        ]
    })
}

/// Create a country result row.
pub fn country_row(id: i64, name: &str) -> TestRow {
    TestRow {
        id,
        country_name: name.to_string(),
        continent_name: "Europe".to_string(),
        region_name: Some("Western Europe".to_string()),
        capital_name: None,
        city_cnt: 0,
    }
}

/// `count` rows named `Country 1`, `Country 2`, ...
pub fn country_rows(count: usize) -> Vec<Map<String, JsonValue>> {
    (1..=count)
        .map(|i| country_row(i as i64, &format!("Country {i}")).into_row())
        .collect()
}

/// A result row builder.
#[derive(Debug, Clone)]
pub struct TestRow {
    pub id: i64,
    pub country_name: String,
    pub continent_name: String,
    pub region_name: Option<String>,
    pub capital_name: Option<String>,
    pub city_cnt: i64,
}

impl TestRow {
    pub fn with_continent(mut self, continent: &str) -> Self {
        self.continent_name = continent.to_string();
        self
    }

    /// Clear the region (NULL in the result).
    pub fn without_region(mut self) -> Self {
        self.region_name = None;
        self
    }

    pub fn with_capital(mut self, capital: &str) -> Self {
        self.capital_name = Some(capital.to_string());
        self
    }

    pub fn with_city_count(mut self, count: i64) -> Self {
        self.city_cnt = count;
        self
    }

    /// The row as the executor returns it, keyed by output alias.
    pub fn into_row(self) -> Map<String, JsonValue> {
        let mut row = Map::new();
        row.insert("id".to_string(), json!(self.id));
        row.insert("country_name".to_string(), json!(self.country_name));
        row.insert("continent_name".to_string(), json!(self.continent_name));
        row.insert("region_name".to_string(), json!(self.region_name));
        row.insert("capital_name".to_string(), json!(self.capital_name));
        row.insert("city_cnt".to_string(), json!(self.city_cnt));
        row
    }
}

/// Assertion helpers for rendered SQL and JSON output.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that `needles` occur in `haystack` in the given order.
    pub fn in_order(haystack: &str, needles: &[&str]) {
        let mut from = 0;
        for needle in needles {
            match haystack[from..].find(needle) {
                Some(pos) => from += pos + needle.len(),
                None => panic!("Expected '{needle}' after byte {from}\nActual: {haystack}"),
            }
        }
    }
}
