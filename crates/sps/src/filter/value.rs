//! Filter values and the named parameter bag.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::{SpsError, SpsResult};

/// A value bound to a named query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// List of scalars (BETWEEN bounds, IN members).
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Convert a JSON filter value, rejecting objects and nested lists.
    pub fn from_json(value: &JsonValue) -> SpsResult<Self> {
        match value {
            JsonValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    JsonValue::Array(_) | JsonValue::Object(_) => Err(SpsError::validation(
                        "filter value lists may only contain scalars",
                    )),
                    scalar => Self::scalar_from_json(scalar),
                })
                .collect::<SpsResult<Vec<_>>>()
                .map(ParamValue::List),
            JsonValue::Object(_) => Err(SpsError::validation(
                "filter values must be scalars or lists of scalars",
            )),
            scalar => Self::scalar_from_json(scalar),
        }
    }

    fn scalar_from_json(value: &JsonValue) -> SpsResult<Self> {
        Ok(match value {
            JsonValue::Null => ParamValue::Null,
            JsonValue::Bool(b) => ParamValue::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Integer(i),
                None => ParamValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => ParamValue::String(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => {
                return Err(SpsError::validation("expected a scalar filter value"));
            }
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Text form used when building LIKE patterns.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ParamValue::String(s) => Some(s.clone()),
            ParamValue::Integer(i) => Some(i.to_string()),
            ParamValue::Float(f) => Some(f.to_string()),
            ParamValue::Boolean(b) => Some(b.to_string()),
            ParamValue::Null | ParamValue::List(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Boolean(value)
    }
}

/// Ordered mapping of parameter name (`:name_3`) to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Vec<(String, ParamValue)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any earlier value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append every parameter of `other`, in order.
    pub fn extend(&mut self, other: Parameters) {
        for (name, value) in other.0 {
            self.insert(name, value);
        }
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_conversion() {
        assert_eq!(ParamValue::from_json(&json!(30)).unwrap(), ParamValue::Integer(30));
        assert_eq!(ParamValue::from_json(&json!(1.5)).unwrap(), ParamValue::Float(1.5));
        assert_eq!(
            ParamValue::from_json(&json!(["a", 2])).unwrap(),
            ParamValue::List(vec![ParamValue::from("a"), ParamValue::Integer(2)])
        );
        assert!(ParamValue::from_json(&json!(null)).unwrap().is_null());
    }

    #[test]
    fn objects_and_nested_lists_rejected() {
        assert!(matches!(
            ParamValue::from_json(&json!({"a": 1})),
            Err(SpsError::Validation(_))
        ));
        assert!(matches!(
            ParamValue::from_json(&json!([[1, 2]])),
            Err(SpsError::Validation(_))
        ));
    }

    #[test]
    fn parameters_keep_insertion_order() {
        let mut params = Parameters::new();
        params.insert(":b_2", ParamValue::Integer(2));
        params.insert(":a_1", ParamValue::Integer(1));
        params.insert(":b_2", ParamValue::Integer(3));

        assert_eq!(params.names().collect::<Vec<_>>(), vec![":b_2", ":a_1"]);
        assert_eq!(params.get(":b_2"), Some(&ParamValue::Integer(3)));
        assert_eq!(
            serde_json::to_string(&params).unwrap(),
            r#"{":b_2":3,":a_1":1}"#
        );
    }
}
