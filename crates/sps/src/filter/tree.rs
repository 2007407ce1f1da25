//! Filter tree construction from untyped client specifications.
//!
//! A specification is either a group
//! `{"bool_operator": "or", "collection": [...]}` or a condition
//! `{"bool_operator": "and", "property": "age", "operator": "greater_than", "value": 30}`.
//! A condition may also wrap its fields in a `"condition"` object and may
//! spell `operator` as `comparison_operator`. A bare array stands for a group
//! with that collection.

use serde_json::{Map, Value as JsonValue};

use super::group::{Group, trim_connective};
use super::operator::Operator;
use super::predicate::{BoolOperator, ExpressionMode, Predicate};
use super::value::Parameters;
use crate::catalog::FieldCatalog;
use crate::error::{SpsError, SpsResult};

/// A compiled filter node.
#[derive(Debug, Clone)]
pub enum FilterNode {
    Predicate(Predicate),
    Group(Group),
}

impl FilterNode {
    pub fn compile(&self, mode: ExpressionMode) -> Option<String> {
        match self {
            FilterNode::Predicate(p) => p.compile(mode),
            FilterNode::Group(g) => g.compile(mode),
        }
    }

    pub fn is_aggregated(&self) -> bool {
        match self {
            FilterNode::Predicate(p) => p.is_aggregated(),
            FilterNode::Group(g) => g.is_aggregated(),
        }
    }

    pub fn parameters(&self) -> Parameters {
        match self {
            FilterNode::Predicate(p) => p.parameters(),
            FilterNode::Group(g) => g.parameters(),
        }
    }

    pub fn sequential_number(&self) -> u32 {
        match self {
            FilterNode::Predicate(p) => p.sequential_number(),
            FilterNode::Group(g) => g.sequential_number(),
        }
    }

    /// Expression for a WHERE clause, without the leading connective.
    pub fn where_clause(&self, mode: ExpressionMode) -> Option<String> {
        self.compile(mode)
            .map(|fragment| trim_connective(&fragment).to_string())
    }

    /// Visit every predicate in pre-order.
    pub fn for_each_predicate<'a>(&'a self, f: &mut impl FnMut(&'a Predicate)) {
        match self {
            FilterNode::Predicate(p) => f(p),
            FilterNode::Group(g) => {
                for child in g.children() {
                    child.for_each_predicate(f);
                }
            }
        }
    }
}

/// Builds [`FilterNode`] trees from JSON specifications.
pub struct FilterTree;

impl FilterTree {
    /// Build a tree numbered from zero.
    pub fn build(spec: &JsonValue, catalog: &FieldCatalog) -> SpsResult<FilterNode> {
        Self::build_from(spec, catalog, 0)
    }

    /// Build a tree whose root carries `start`.
    ///
    /// Nodes are numbered in pre-order, so the children of a flat group get
    /// `start + index + 1` and parameter names never collide.
    pub fn build_from(spec: &JsonValue, catalog: &FieldCatalog, start: u32) -> SpsResult<FilterNode> {
        let mut builder = Builder {
            catalog,
            next: start,
        };
        match spec {
            JsonValue::Null => Ok(FilterNode::Group(Group::new(builder.take(), BoolOperator::And))),
            JsonValue::Object(obj) if obj.is_empty() => {
                Ok(FilterNode::Group(Group::new(builder.take(), BoolOperator::And)))
            }
            _ => builder.node(spec),
        }
    }

    /// Check every condition against the catalog without building.
    ///
    /// Returns the number of conditions checked.
    pub fn validate(spec: &JsonValue, catalog: &FieldCatalog) -> SpsResult<usize> {
        match spec {
            JsonValue::Null => Ok(0),
            JsonValue::Array(items) => Self::validate_items(items, catalog),
            JsonValue::Object(obj) if obj.is_empty() => Ok(0),
            JsonValue::Object(obj) => match obj.get("collection") {
                Some(collection) => Self::validate_items(expect_collection(collection)?, catalog),
                None => {
                    let leaf = Leaf::parse(obj)?;
                    catalog.check_filter(leaf.property, leaf.operator)?;
                    Ok(1)
                }
            },
            other => Err(SpsError::configuration(format!(
                "filter must be an object or an array, got {other}"
            ))),
        }
    }

    fn validate_items(items: &[JsonValue], catalog: &FieldCatalog) -> SpsResult<usize> {
        let mut checked = 0;
        for item in items {
            expect_entry(item)?;
            checked += Self::validate(item, catalog)?;
        }
        Ok(checked)
    }
}

struct Builder<'a> {
    catalog: &'a FieldCatalog,
    next: u32,
}

impl Builder<'_> {
    fn take(&mut self) -> u32 {
        let n = self.next;
        self.next += 1;
        n
    }

    fn node(&mut self, spec: &JsonValue) -> SpsResult<FilterNode> {
        match spec {
            JsonValue::Array(items) => self.group(BoolOperator::And, items),
            JsonValue::Object(obj) => {
                let bool_operator = BoolOperator::from_json(obj.get("bool_operator"))?;
                match obj.get("collection") {
                    Some(collection) => self.group(bool_operator, expect_collection(collection)?),
                    None => self.predicate(bool_operator, obj),
                }
            }
            other => Err(SpsError::configuration(format!(
                "filter must be an object or an array, got {other}"
            ))),
        }
    }

    fn group(&mut self, bool_operator: BoolOperator, items: &[JsonValue]) -> SpsResult<FilterNode> {
        let mut group = Group::new(self.take(), bool_operator);
        for item in items {
            group.push(self.node(item)?);
        }
        Ok(FilterNode::Group(group))
    }

    fn predicate(
        &mut self,
        bool_operator: BoolOperator,
        obj: &Map<String, JsonValue>,
    ) -> SpsResult<FilterNode> {
        let leaf = Leaf::parse(obj)?;
        let field = self.catalog.resolve(leaf.property)?;
        let seq = self.take();
        Predicate::new(seq, bool_operator, field, leaf.operator, leaf.value).map(FilterNode::Predicate)
    }
}

/// The condition part of a leaf specification.
struct Leaf<'a> {
    property: &'a str,
    operator: Operator,
    value: &'a JsonValue,
}

impl<'a> Leaf<'a> {
    fn parse(obj: &'a Map<String, JsonValue>) -> SpsResult<Self> {
        let data = match obj.get("condition") {
            Some(JsonValue::Object(inner)) => inner,
            Some(other) => {
                return Err(SpsError::configuration(format!(
                    "\"condition\" must be an object, got {other}"
                )));
            }
            None => obj,
        };

        let Some(property) = data.get("property").and_then(JsonValue::as_str) else {
            return Err(SpsError::configuration("filter condition has no \"property\""));
        };
        let token = data
            .get("operator")
            .or_else(|| data.get("comparison_operator"))
            .and_then(JsonValue::as_str);
        let Some(token) = token else {
            return Err(SpsError::configuration(format!(
                "filter condition on \"{property}\" has no \"operator\""
            )));
        };

        Ok(Self {
            property,
            operator: Operator::from_token(token)?,
            value: data.get("value").unwrap_or(&JsonValue::Null),
        })
    }
}

fn expect_collection(value: &JsonValue) -> SpsResult<&Vec<JsonValue>> {
    value
        .as_array()
        .ok_or_else(|| SpsError::configuration("\"collection\" must be an array"))
}

/// Collection entries are conditions, collections or bare arrays of either.
fn expect_entry(value: &JsonValue) -> SpsResult<()> {
    if value.is_object() || value.is_array() {
        return Ok(());
    }
    Err(SpsError::configuration(format!(
        "filter entries must be objects or arrays, got {value}"
    )))
}
