//! Field catalog: the allow-listed surface of a list query.
//!
//! Maps client-facing field names (the skeleton's output aliases) to the
//! internal expressions they stand for, and records which fields may be
//! filtered or sorted, with which operators, and how.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{SpsError, SpsResult};
use crate::filter::hooks::{ExpressionRenderer, LowerRenderer, LowercaseTransform, ValueTransform};
use crate::filter::operator::Operator;
use crate::query::platform::Platform;
use crate::query::skeleton::QuerySkeleton;

/// One field of the catalog.
#[derive(Clone)]
pub struct FieldEntry {
    /// External (client-facing) name; the output alias.
    pub name: String,

    /// Internal expression usable before the query is wrapped.
    pub expression: String,

    /// The output alias as written in the wrapping query, quoted like the
    /// skeleton's select list.
    pub alias: String,

    /// Operators allowed when filtering on this field.
    pub operators: Vec<Operator>,

    pub filterable: bool,
    pub sortable: bool,

    /// Compare and sort through `lower(...)`, lower-casing values.
    pub lower_cased: bool,

    /// Computed by an aggregate; filters apply on the wrapping query.
    pub aggregated: bool,

    pub renderer: Option<Arc<dyn ExpressionRenderer>>,
    pub transform: Option<Arc<dyn ValueTransform>>,
}

impl FieldEntry {
    fn new(name: String, expression: String) -> Self {
        Self {
            alias: name.clone(),
            name,
            expression,
            operators: Operator::ALL.to_vec(),
            filterable: true,
            sortable: true,
            lower_cased: false,
            aggregated: false,
            renderer: None,
            transform: None,
        }
    }

    pub fn allows(&self, operator: Operator) -> bool {
        self.operators.contains(&operator)
    }

    /// Renderer applied to predicates on this field, if any.
    ///
    /// An explicit renderer wins over the lower-casing one.
    pub fn effective_renderer(&self) -> Option<Arc<dyn ExpressionRenderer>> {
        match (&self.renderer, self.lower_cased) {
            (Some(renderer), _) => Some(Arc::clone(renderer)),
            (None, true) => Some(Arc::new(LowerRenderer)),
            (None, false) => None,
        }
    }

    pub fn effective_transform(&self) -> Option<Arc<dyn ValueTransform>> {
        match (&self.transform, self.lower_cased) {
            (Some(transform), _) => Some(Arc::clone(transform)),
            (None, true) => Some(Arc::new(LowercaseTransform)),
            (None, false) => None,
        }
    }

    /// Expression used in ORDER BY.
    ///
    /// Once the query is wrapped only the alias is addressable.
    pub fn sort_expression(&self, wrapped: bool) -> String {
        let expr = if wrapped { &self.alias } else { &self.expression };
        if self.lower_cased {
            format!("lower({expr})")
        } else {
            expr.clone()
        }
    }
}

impl fmt::Debug for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEntry")
            .field("name", &self.name)
            .field("expression", &self.expression)
            .field("alias", &self.alias)
            .field("operators", &self.operators)
            .field("filterable", &self.filterable)
            .field("sortable", &self.sortable)
            .field("lower_cased", &self.lower_cased)
            .field("aggregated", &self.aggregated)
            .field("renderer", &self.renderer.is_some())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Declarative per-field customization, loadable from a list definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Narrow the allowed operators.
    pub operators: Option<Vec<Operator>>,

    pub filterable: Option<bool>,
    pub sortable: Option<bool>,

    #[serde(default)]
    pub lower_cased: bool,

    #[serde(default)]
    pub aggregated: bool,

    /// Replace the internal expression used for filtering and sorting.
    pub expression: Option<String>,
}

/// Allowed filter surface for one field, as reported by `describe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterHelp {
    pub operators: Vec<Operator>,
}

/// Filterable and sortable surface of a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogHelp {
    pub allowed_filters: BTreeMap<String, FilterHelp>,
    pub allowed_sort: Vec<String>,
}

/// Per-request catalog of filterable/sortable fields.
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    fields: Vec<FieldEntry>,
    index: HashMap<String, usize>,
}

impl FieldCatalog {
    /// Build from `(alias, expression)` pairs, in declaration order.
    pub fn from_columns<I, A, E>(columns: I) -> Self
    where
        I: IntoIterator<Item = (A, E)>,
        A: Into<String>,
        E: Into<String>,
    {
        let mut catalog = Self::default();
        for (alias, expression) in columns {
            let alias = alias.into();
            let entry = FieldEntry::new(alias.clone(), expression.into());
            match catalog.index.get(&alias) {
                Some(&i) => catalog.fields[i] = entry,
                None => {
                    catalog.index.insert(alias, catalog.fields.len());
                    catalog.fields.push(entry);
                }
            }
        }
        catalog
    }

    /// Build from the skeleton's declared output columns.
    ///
    /// Aliases are quoted for `platform` so references from a wrapping query
    /// keep their case.
    pub fn from_skeleton(skeleton: &QuerySkeleton, platform: Platform) -> SpsResult<Self> {
        let mut catalog = Self::from_columns(skeleton.columns()?);
        for field in &mut catalog.fields {
            field.alias = platform.quote_identifier(&field.name);
        }
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&FieldEntry> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    fn get_mut(&mut self, name: &str) -> SpsResult<&mut FieldEntry> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.fields[i]),
            None => Err(SpsError::configuration(format!(
                "field \"{name}\" is not declared by the query"
            ))),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldEntry> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_filter_allowed(&self, name: &str) -> bool {
        self.get(name).is_some_and(|f| f.filterable)
    }

    pub fn is_sort_allowed(&self, name: &str) -> bool {
        self.get(name).is_some_and(|f| f.sortable)
    }

    /// Resolve a filter property to its catalog entry.
    pub fn resolve(&self, name: &str) -> SpsResult<&FieldEntry> {
        self.get(name)
            .filter(|f| f.filterable)
            .ok_or_else(|| SpsError::validation(format!("filter by \"{name}\" is not allowed")))
    }

    /// Check that `operator` may be used on field `name`.
    pub fn check_filter(&self, name: &str, operator: Operator) -> SpsResult<&FieldEntry> {
        let field = self.resolve(name)?;
        if !field.allows(operator) {
            return Err(SpsError::validation(format!(
                "comparison operator \"{operator}\" by \"{name}\" is not allowed"
            )));
        }
        Ok(field)
    }

    /// Apply declarative options to one field.
    pub fn customize(&mut self, name: &str, options: &FieldOptions) -> SpsResult<()> {
        let field = self.get_mut(name)?;
        if let Some(ref operators) = options.operators {
            field.operators = operators.clone();
        }
        if let Some(filterable) = options.filterable {
            field.filterable = filterable;
        }
        if let Some(sortable) = options.sortable {
            field.sortable = sortable;
        }
        if let Some(ref expression) = options.expression {
            field.expression = expression.clone();
        }
        field.lower_cased |= options.lower_cased;
        field.aggregated |= options.aggregated;
        Ok(())
    }

    /// Apply options for several fields.
    pub fn customize_all<'a, I>(&mut self, options: I) -> SpsResult<()>
    where
        I: IntoIterator<Item = (&'a String, &'a FieldOptions)>,
    {
        for (name, opts) in options {
            self.customize(name, opts)?;
        }
        Ok(())
    }

    /// Allow filtering only on the listed fields.
    pub fn restrict_filters(&mut self, names: &[&str]) -> SpsResult<()> {
        self.check_declared(names)?;
        for field in &mut self.fields {
            field.filterable = names.contains(&field.name.as_str());
        }
        Ok(())
    }

    /// Allow sorting only on the listed fields.
    pub fn restrict_sort(&mut self, names: &[&str]) -> SpsResult<()> {
        self.check_declared(names)?;
        for field in &mut self.fields {
            field.sortable = names.contains(&field.name.as_str());
        }
        Ok(())
    }

    fn check_declared(&self, names: &[&str]) -> SpsResult<()> {
        match names.iter().find(|n| !self.index.contains_key(**n)) {
            Some(unknown) => Err(SpsError::configuration(format!(
                "field \"{unknown}\" is not declared by the query"
            ))),
            None => Ok(()),
        }
    }

    pub fn set_renderer(
        &mut self,
        name: &str,
        renderer: impl ExpressionRenderer + 'static,
    ) -> SpsResult<()> {
        self.get_mut(name)?.renderer = Some(Arc::new(renderer));
        Ok(())
    }

    pub fn set_transform(
        &mut self,
        name: &str,
        transform: impl ValueTransform + 'static,
    ) -> SpsResult<()> {
        self.get_mut(name)?.transform = Some(Arc::new(transform));
        Ok(())
    }

    /// The filterable/sortable surface, for client discovery.
    pub fn describe(&self) -> CatalogHelp {
        CatalogHelp {
            allowed_filters: self
                .fields
                .iter()
                .filter(|f| f.filterable)
                .map(|f| {
                    (
                        f.name.clone(),
                        FilterHelp {
                            operators: f.operators.clone(),
                        },
                    )
                })
                .collect(),
            allowed_sort: self
                .fields
                .iter()
                .filter(|f| f.sortable)
                .map(|f| f.name.clone())
                .collect(),
        }
    }
}

/// Split a select-list entry into `(expression, alias)`.
///
/// `country.name AS country_name` and `country.name country_name` both give
/// the alias `country_name`; a bare `country.name` is aliased `name`.
pub fn extract_field_and_alias(declaration: &str) -> SpsResult<(String, String)> {
    let normalized = declaration.split_whitespace().collect::<Vec<_>>().join(" ");
    let lowered = normalized.to_ascii_lowercase();

    let parts: Vec<&str> = if lowered.contains(" as ") {
        let mut parts = Vec::new();
        let mut start = 0;
        for (pos, _) in lowered.match_indices(" as ") {
            parts.push(&normalized[start..pos]);
            start = pos + 4;
        }
        parts.push(&normalized[start..]);
        parts
    } else {
        normalized.split(' ').collect()
    };

    match parts.as_slice() {
        [field] if !field.is_empty() => {
            let alias = field.rsplit('.').next().unwrap_or(field);
            Ok(((*field).to_string(), alias.to_string()))
        }
        [field, alias] if !field.is_empty() && !alias.is_empty() => {
            Ok(((*field).to_string(), (*alias).to_string()))
        }
        _ => Err(SpsError::configuration(format!(
            "select expression \"{declaration}\" is wrong"
        ))),
    }
}
