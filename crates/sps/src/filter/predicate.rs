//! Leaf predicates: one field compared against one value.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use super::hooks::{ExpressionRenderer, PredicateView, ValueTransform};
use super::operator::Operator;
use super::value::{ParamValue, Parameters};
use crate::catalog::FieldEntry;
use crate::error::{SpsError, SpsResult};

/// Connective joining a node to its preceding sibling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOperator {
    #[default]
    And,
    Or,
}

impl BoolOperator {
    /// Parse a `bool_operator` value. Missing, null and empty mean AND.
    pub fn from_json(value: Option<&JsonValue>) -> SpsResult<Self> {
        match value {
            None | Some(JsonValue::Null) => Ok(BoolOperator::And),
            Some(JsonValue::String(s)) => Self::from_token(s),
            Some(other) => Err(SpsError::configuration(format!(
                "bool operator must be \"and\" or \"or\", got {other}"
            ))),
        }
    }

    pub fn from_token(token: &str) -> SpsResult<Self> {
        let token = token.trim();
        if token.is_empty() || token.eq_ignore_ascii_case("and") {
            Ok(BoolOperator::And)
        } else if token.eq_ignore_ascii_case("or") {
            Ok(BoolOperator::Or)
        } else {
            Err(SpsError::configuration(format!(
                "bool operator must be \"and\" or \"or\", got \"{token}\""
            )))
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            BoolOperator::And => "AND",
            BoolOperator::Or => "OR",
        }
    }
}

impl fmt::Display for BoolOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

/// Which expression slot a compile pass uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionMode {
    /// Internal expressions, applied to the base query.
    Internal,
    /// Quoted output aliases, applied to the wrapping query.
    External,
}

/// One field comparison.
#[derive(Clone)]
pub struct Predicate {
    sequential_number: u32,
    bool_operator: BoolOperator,
    internal_expression: String,
    external_expression: String,
    operator: Operator,
    /// `None` when the filter is absent.
    value: Option<ParamValue>,
    aggregated: bool,
    parameter_base: String,
    renderer: Option<Arc<dyn ExpressionRenderer>>,
}

impl Predicate {
    /// Build a predicate for `field`, converting and transforming `raw`.
    ///
    /// The field's transform runs here, once; list values are transformed
    /// element-wise.
    pub fn new(
        sequential_number: u32,
        bool_operator: BoolOperator,
        field: &FieldEntry,
        operator: Operator,
        raw: &JsonValue,
    ) -> SpsResult<Self> {
        let value = ParamValue::from_json(raw)?;
        let absent =
            value.is_null() || matches!(&value, ParamValue::List(items) if items.is_empty());

        let value = if operator.is_null_check() || absent {
            None
        } else {
            let value = match field.effective_transform() {
                Some(transform) => apply_transform(&field.name, transform.as_ref(), value)?,
                None => value,
            };
            check_shape(&field.name, operator, &value)?;
            Some(value)
        };

        Ok(Self {
            sequential_number,
            bool_operator,
            internal_expression: field.expression.clone(),
            external_expression: field.alias.clone(),
            operator,
            value,
            aggregated: field.aggregated,
            parameter_base: parameter_base(&field.name, sequential_number),
            renderer: field.effective_renderer(),
        })
    }

    pub fn sequential_number(&self) -> u32 {
        self.sequential_number
    }

    pub fn bool_operator(&self) -> BoolOperator {
        self.bool_operator
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> Option<&ParamValue> {
        self.value.as_ref()
    }

    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }

    pub fn external_expression(&self) -> &str {
        &self.external_expression
    }

    /// Compile to a fragment such as `AND t.age > :age_1`.
    ///
    /// Returns `None` when the predicate contributes nothing to this pass.
    pub fn compile(&self, mode: ExpressionMode) -> Option<String> {
        if mode == ExpressionMode::Internal && self.aggregated {
            return None;
        }
        let expression = match mode {
            ExpressionMode::Internal => self.internal_expression.as_str(),
            ExpressionMode::External => self.external_expression.as_str(),
        };
        if expression.trim().is_empty() {
            return None;
        }
        if self.value.is_none() && !self.operator.is_null_check() {
            return None;
        }

        let rendered = self.render_operator();
        let body = match &self.renderer {
            Some(renderer) => renderer.render(&PredicateView {
                expression,
                operator: self.operator,
                rendered: &rendered,
            }),
            None => format!("{expression} {rendered}"),
        };
        Some(format!("{} {}", self.bool_operator, body.trim()))
    }

    /// Operator and placeholder text for this predicate.
    fn render_operator(&self) -> String {
        let op = self.operator.sql();
        let base = &self.parameter_base;
        if self.operator.is_null_check() {
            op.to_string()
        } else if self.operator.is_between() {
            format!("{op} {base}_0 AND {base}_1")
        } else if self.operator.is_set_membership() {
            format!("{op}({base})")
        } else {
            format!("{op} {base}")
        }
    }

    /// Named parameters of this predicate, with LIKE wildcards applied.
    ///
    /// Pure: repeated calls return identical bags.
    pub fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        let Some(value) = &self.value else {
            return params;
        };
        if self.operator.is_null_check() {
            return params;
        }

        if self.operator.is_between() {
            if let ParamValue::List(bounds) = value {
                for (i, bound) in bounds.iter().enumerate() {
                    params.insert(format!("{}_{i}", self.parameter_base), bound.clone());
                }
            }
            return params;
        }

        let value = match value.as_text().and_then(|t| self.operator.wildcard(&t)) {
            Some(pattern) => ParamValue::String(pattern),
            None => value.clone(),
        };
        params.insert(self.parameter_base.clone(), value);
        params
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("sequential_number", &self.sequential_number)
            .field("bool_operator", &self.bool_operator)
            .field("internal_expression", &self.internal_expression)
            .field("external_expression", &self.external_expression)
            .field("operator", &self.operator)
            .field("value", &self.value)
            .field("aggregated", &self.aggregated)
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

/// `:` + alphanumerics of the name, lower-cased, + `_{seq}`.
fn parameter_base(name: &str, sequential_number: u32) -> String {
    let stem: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    format!(":{stem}_{sequential_number}")
}

fn apply_transform(
    field: &str,
    transform: &dyn ValueTransform,
    value: ParamValue,
) -> SpsResult<ParamValue> {
    let wrap = |e: anyhow::Error| SpsError::Transform {
        field: field.to_string(),
        message: format!("{e:#}"),
    };
    match value {
        ParamValue::List(items) => items
            .into_iter()
            .map(|item| transform.apply(item).map_err(wrap))
            .collect::<SpsResult<Vec<_>>>()
            .map(ParamValue::List),
        scalar => transform.apply(scalar).map_err(wrap),
    }
}

fn check_shape(field: &str, operator: Operator, value: &ParamValue) -> SpsResult<()> {
    match value {
        ParamValue::List(items) if operator.is_between() && items.len() != 2 => {
            Err(SpsError::validation(format!(
                "\"{operator}\" by \"{field}\" needs exactly two values, got {}",
                items.len()
            )))
        }
        ParamValue::List(_) if operator.is_between() || operator.is_set_membership() => Ok(()),
        ParamValue::List(_) => Err(SpsError::validation(format!(
            "\"{operator}\" by \"{field}\" does not accept a list of values"
        ))),
        _ if operator.is_between() => Err(SpsError::validation(format!(
            "\"{operator}\" by \"{field}\" needs exactly two values"
        ))),
        _ if operator.is_set_membership() => Err(SpsError::validation(format!(
            "\"{operator}\" by \"{field}\" needs a list of values"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldCatalog, FieldOptions};
    use serde_json::json;

    fn catalog() -> FieldCatalog {
        let mut catalog = FieldCatalog::from_columns([
            ("age", "t.age"),
            ("country_name", "country.name"),
            ("city_cnt", "COUNT(city.id)"),
        ]);
        catalog
            .customize(
                "city_cnt",
                &FieldOptions {
                    aggregated: true,
                    ..Default::default()
                },
            )
            .unwrap();
        catalog
    }

    fn predicate(seq: u32, name: &str, op: Operator, value: JsonValue) -> SpsResult<Predicate> {
        let catalog = catalog();
        Predicate::new(seq, BoolOperator::And, catalog.get(name).unwrap(), op, &value)
    }

    #[test]
    fn bool_operator_parsing() {
        assert_eq!(BoolOperator::from_token("OR").unwrap(), BoolOperator::Or);
        assert_eq!(BoolOperator::from_token(" and ").unwrap(), BoolOperator::And);
        assert_eq!(BoolOperator::from_token("").unwrap(), BoolOperator::And);
        assert_eq!(BoolOperator::from_json(None).unwrap(), BoolOperator::And);
        assert_eq!(
            BoolOperator::from_json(Some(&json!(null))).unwrap(),
            BoolOperator::And
        );
        assert!(matches!(
            BoolOperator::from_token("xor"),
            Err(SpsError::Configuration(_))
        ));
        assert!(BoolOperator::from_json(Some(&json!(1))).is_err());
    }

    #[test]
    fn simple_comparison() {
        let p = predicate(1, "age", Operator::GreaterThan, json!(30)).unwrap();
        assert_eq!(
            p.compile(ExpressionMode::Internal).as_deref(),
            Some("AND t.age > :age_1")
        );
        assert_eq!(
            p.compile(ExpressionMode::External).as_deref(),
            Some("AND age > :age_1")
        );
        assert_eq!(p.parameters().get(":age_1"), Some(&ParamValue::Integer(30)));
    }

    #[test]
    fn parameter_name_strips_punctuation() {
        assert_eq!(parameter_base("Country_Name", 4), ":countryname_4");
        assert_eq!(parameter_base("a.b-c", 0), ":abc_0");
    }

    #[test]
    fn aggregated_only_compiles_externally() {
        let p = predicate(2, "city_cnt", Operator::GreaterThanOrEqual, json!(3)).unwrap();
        assert!(p.compile(ExpressionMode::Internal).is_none());
        assert_eq!(
            p.compile(ExpressionMode::External).as_deref(),
            Some("AND city_cnt >= :citycnt_2")
        );
    }

    #[test]
    fn null_value_means_absent() {
        let p = predicate(1, "age", Operator::Equals, json!(null)).unwrap();
        assert!(p.compile(ExpressionMode::Internal).is_none());
        assert!(p.parameters().is_empty());

        let p = predicate(1, "age", Operator::In, json!([])).unwrap();
        assert!(p.compile(ExpressionMode::Internal).is_none());
    }

    #[test]
    fn null_checks_have_no_parameters() {
        let p = predicate(3, "age", Operator::IsNotNull, json!(null)).unwrap();
        assert_eq!(
            p.compile(ExpressionMode::Internal).as_deref(),
            Some("AND t.age IS NOT NULL")
        );
        assert!(p.parameters().is_empty());

        let p = predicate(3, "age", Operator::IsNull, json!("ignored")).unwrap();
        assert_eq!(
            p.compile(ExpressionMode::Internal).as_deref(),
            Some("AND t.age IS NULL")
        );
        assert!(p.parameters().is_empty());
    }

    #[test]
    fn between_uses_two_parameters() {
        let p = predicate(5, "age", Operator::Between, json!([1, 2])).unwrap();
        assert_eq!(
            p.compile(ExpressionMode::Internal).as_deref(),
            Some("AND t.age BETWEEN :age_5_0 AND :age_5_1")
        );
        let params = p.parameters();
        assert_eq!(params.names().collect::<Vec<_>>(), vec![":age_5_0", ":age_5_1"]);
        assert_eq!(params.get(":age_5_1"), Some(&ParamValue::Integer(2)));
    }

    #[test]
    fn between_arity_is_validated() {
        let err = predicate(5, "age", Operator::Between, json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, SpsError::Validation(_)));
        assert!(predicate(5, "age", Operator::NotBetween, json!(4)).is_err());
    }

    #[test]
    fn in_needs_a_list() {
        let p = predicate(2, "age", Operator::NotIn, json!([1, 2, 3])).unwrap();
        assert_eq!(
            p.compile(ExpressionMode::Internal).as_deref(),
            Some("AND t.age NOT IN(:age_2)")
        );
        assert!(matches!(
            predicate(2, "age", Operator::In, json!(1)),
            Err(SpsError::Validation(_))
        ));
        assert!(matches!(
            predicate(2, "age", Operator::Equals, json!([1])),
            Err(SpsError::Validation(_))
        ));
    }

    #[test]
    fn like_wildcards_are_idempotent() {
        let p = predicate(1, "country_name", Operator::Contains, json!("abc")).unwrap();
        let first = p.parameters();
        let second = p.parameters();
        assert_eq!(first, second);
        assert_eq!(
            first.get(":countryname_1"),
            Some(&ParamValue::from("%abc%"))
        );

        let p = predicate(1, "country_name", Operator::BeginsWith, json!("abc")).unwrap();
        assert_eq!(p.parameters().get(":countryname_1"), Some(&ParamValue::from("abc%")));
        let p = predicate(1, "country_name", Operator::NotEndsWith, json!("abc")).unwrap();
        assert_eq!(p.parameters().get(":countryname_1"), Some(&ParamValue::from("%abc")));
    }

    #[test]
    fn renderer_gets_view_and_bool_prefix() {
        let mut catalog = catalog();
        catalog
            .set_renderer("country_name", |view: &PredicateView<'_>| {
                format!("unaccent({}) {}", view.expression, view.rendered)
            })
            .unwrap();
        let p = Predicate::new(
            7,
            BoolOperator::Or,
            catalog.get("country_name").unwrap(),
            Operator::Equals,
            &json!("Peru"),
        )
        .unwrap();
        assert_eq!(
            p.compile(ExpressionMode::Internal).as_deref(),
            Some("OR unaccent(country.name) = :countryname_7")
        );
    }

    #[test]
    fn lower_cased_field_lowers_value_once() {
        let mut catalog = catalog();
        catalog
            .customize(
                "country_name",
                &FieldOptions {
                    lower_cased: true,
                    ..Default::default()
                },
            )
            .unwrap();
        let p = Predicate::new(
            1,
            BoolOperator::And,
            catalog.get("country_name").unwrap(),
            Operator::In,
            &json!(["PERU", "Chile"]),
        )
        .unwrap();
        assert_eq!(
            p.compile(ExpressionMode::Internal).as_deref(),
            Some("AND lower(country.name) IN(:countryname_1)")
        );
        assert_eq!(
            p.parameters().get(":countryname_1"),
            Some(&ParamValue::List(vec![
                ParamValue::from("peru"),
                ParamValue::from("chile")
            ]))
        );
    }

    #[test]
    fn transform_failure_names_field() {
        let mut catalog = catalog();
        catalog
            .set_transform("age", |_: ParamValue| -> anyhow::Result<ParamValue> {
                anyhow::bail!("not a number")
            })
            .unwrap();
        let err = Predicate::new(
            1,
            BoolOperator::And,
            catalog.get("age").unwrap(),
            Operator::Equals,
            &json!("x"),
        )
        .unwrap_err();
        assert!(matches!(err, SpsError::Transform { ref field, .. } if field == "age"));
        assert!(err.is_client_error());
    }
}
