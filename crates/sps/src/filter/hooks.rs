//! Per-field hooks for custom predicate rendering and value transforms.
//!
//! Hooks are attached to fields in the [`FieldCatalog`](crate::catalog::FieldCatalog)
//! and copied onto every predicate that targets the field. Closures with the
//! right signature implement both traits.

use anyhow::Result;

use super::operator::Operator;
use super::value::ParamValue;

/// Read-only view of a predicate handed to an [`ExpressionRenderer`].
#[derive(Debug, Clone, Copy)]
pub struct PredicateView<'a> {
    /// Field expression for the current compile mode (internal or alias).
    pub expression: &'a str,
    pub operator: Operator,
    /// Operator and placeholder text, e.g. `> :age_1` or `IN(:id_2)`.
    pub rendered: &'a str,
}

/// Replaces the default `expression operator placeholder` rendering.
///
/// The returned fragment must not carry a leading AND/OR; the predicate
/// prefixes its own connective.
pub trait ExpressionRenderer: Send + Sync {
    fn render(&self, view: &PredicateView<'_>) -> String;
}

impl<F> ExpressionRenderer for F
where
    F: Fn(&PredicateView<'_>) -> String + Send + Sync,
{
    fn render(&self, view: &PredicateView<'_>) -> String {
        self(view)
    }
}

/// Transforms a filter value before it is bound.
///
/// Called once per scalar; list values are transformed element-wise.
pub trait ValueTransform: Send + Sync {
    fn apply(&self, value: ParamValue) -> Result<ParamValue>;
}

impl<F> ValueTransform for F
where
    F: Fn(ParamValue) -> Result<ParamValue> + Send + Sync,
{
    fn apply(&self, value: ParamValue) -> Result<ParamValue> {
        self(value)
    }
}

/// Renders `lower(expression) operator placeholder`.
pub struct LowerRenderer;

impl ExpressionRenderer for LowerRenderer {
    fn render(&self, view: &PredicateView<'_>) -> String {
        format!("lower({}) {}", view.expression, view.rendered)
    }
}

/// Lower-cases string values; other values pass through.
pub struct LowercaseTransform;

impl ValueTransform for LowercaseTransform {
    fn apply(&self, value: ParamValue) -> Result<ParamValue> {
        Ok(match value {
            ParamValue::String(s) => ParamValue::String(s.to_lowercase()),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_renderer_wraps_expression() {
        let view = PredicateView {
            expression: "country.name",
            operator: Operator::Contains,
            rendered: "LIKE :countryname_1",
        };
        assert_eq!(
            LowerRenderer.render(&view),
            "lower(country.name) LIKE :countryname_1"
        );
    }

    #[test]
    fn closures_are_hooks() {
        let renderer = |view: &PredicateView<'_>| format!("{} @@ {}", view.expression, view.rendered);
        let view = PredicateView {
            expression: "doc",
            operator: Operator::Equals,
            rendered: "= :doc_1",
        };
        assert_eq!(renderer.render(&view), "doc @@ = :doc_1");

        let transform = |v: ParamValue| -> Result<ParamValue> {
            match v {
                ParamValue::Integer(i) => Ok(ParamValue::Integer(i * 100)),
                other => Ok(other),
            }
        };
        assert_eq!(
            transform.apply(ParamValue::Integer(3)).unwrap(),
            ParamValue::Integer(300)
        );
    }

    #[test]
    fn lowercase_transform_only_touches_strings() {
        assert_eq!(
            LowercaseTransform.apply(ParamValue::from("ISLANDS")).unwrap(),
            ParamValue::from("islands")
        );
        assert_eq!(
            LowercaseTransform.apply(ParamValue::Integer(7)).unwrap(),
            ParamValue::Integer(7)
        );
    }
}
