//! List query orchestration.
//!
//! [`ListQuery`] owns a skeleton, the field catalog derived from it and the
//! platform policy. [`ListQuery::prepare`] validates a client request and
//! produces a [`PreparedQuery`], which renders page and count statements and
//! fetches a page through a [`QueryExecutor`].

use sea_query::{
    Alias, Asterisk, ConditionalStatement, Expr, OrderedStatement, Query, SelectStatement,
};
use serde_json::Value as JsonValue;

use super::executor::QueryExecutor;
use super::platform::{BoundStatement, Platform};
use super::skeleton::QuerySkeleton;
use super::types::{
    ListDefinition, ListRequest, ListResult, Navigation, PageRequest, SortDirection, SortSpec,
    default_items_per_page,
};
use crate::catalog::{CatalogHelp, FieldCatalog};
use crate::error::{SpsError, SpsResult};
use crate::filter::predicate::ExpressionMode;
use crate::filter::tree::FilterTree;
use crate::filter::value::Parameters;

/// Alias of the derived table used when wrapping or counting.
pub const WRAP_ALIAS: &str = "__sps_alias__";

/// Upper bound applied to `items_per_page` unless configured otherwise.
pub const MAX_ITEMS_PER_PAGE: u64 = 500;

/// Paging limits of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_items_per_page: u64,
    pub max_items_per_page: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_items_per_page: default_items_per_page(),
            max_items_per_page: MAX_ITEMS_PER_PAGE,
        }
    }
}

impl PageLimits {
    /// Validate page numbers and cap the page size.
    fn check(&self, page: u64, items_per_page: u64) -> SpsResult<u64> {
        if page < 1 {
            return Err(SpsError::validation("page must be at least 1"));
        }
        if items_per_page < 1 {
            return Err(SpsError::validation("items_per_page must be at least 1"));
        }
        if items_per_page > self.max_items_per_page {
            tracing::warn!(
                requested = items_per_page,
                capped = self.max_items_per_page,
                "items_per_page exceeds maximum, capping"
            );
            return Ok(self.max_items_per_page);
        }
        Ok(items_per_page)
    }
}

/// Rows skipped before `page`; databases take OFFSET as a signed 64-bit value.
fn page_offset(page: u64, items_per_page: u64) -> SpsResult<u64> {
    page
        .checked_sub(1)
        .and_then(|skipped| skipped.checked_mul(items_per_page))
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| SpsError::validation(format!("page {page} is out of range")))
}

/// A list over a fixed skeleton with an allow-listed filter/sort surface.
#[derive(Debug, Clone)]
pub struct ListQuery {
    skeleton: QuerySkeleton,
    catalog: FieldCatalog,
    platform: Platform,
    limits: PageLimits,
}

impl ListQuery {
    /// Resolve the skeleton's output columns into a default catalog.
    pub fn new(skeleton: QuerySkeleton, platform: Platform) -> SpsResult<Self> {
        let catalog = FieldCatalog::from_skeleton(&skeleton, platform)?;
        tracing::debug!(fields = catalog.len(), platform = %platform, "fields resolved");
        Ok(Self {
            skeleton,
            catalog,
            platform,
            limits: PageLimits::default(),
        })
    }

    /// Build from a list definition, applying its field options.
    ///
    /// `default_platform` is used unless the definition names one.
    pub fn from_definition(definition: &ListDefinition, default_platform: Platform) -> SpsResult<Self> {
        let platform = match definition.platform.as_deref() {
            Some(name) => Platform::from_name(name)?,
            None => default_platform,
        };
        let mut query = Self::new(definition.skeleton.clone(), platform)?;
        query.catalog.customize_all(&definition.fields)?;
        if let Some(ref names) = definition.filterable {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            query.catalog.restrict_filters(&names)?;
        }
        if let Some(ref names) = definition.sortable {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            query.catalog.restrict_sort(&names)?;
        }
        Ok(query)
    }

    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    /// Customize fields before preparing requests.
    pub fn catalog_mut(&mut self) -> &mut FieldCatalog {
        &mut self.catalog
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    /// Allowed filters and sorts, for client discovery.
    pub fn describe(&self) -> CatalogHelp {
        self.catalog.describe()
    }

    /// Validate and compile filters and sorts against the skeleton.
    pub fn prepare(&self, filters: &JsonValue, sort: &[SortSpec]) -> SpsResult<PreparedQuery> {
        let checked = FilterTree::validate(filters, &self.catalog)?;
        tracing::debug!(conditions = checked, "filters validated");

        let tree = FilterTree::build(filters, &self.catalog)?;
        let parameters = tree.parameters();
        tracing::debug!(parameters = parameters.len(), "condition compiled");

        let mut statement = self.skeleton.to_statement()?;
        if let Some(clause) = tree.where_clause(ExpressionMode::Internal) {
            tracing::debug!(clause = %clause, "where applied");
            statement.and_where(Expr::cust(clause));
        }

        let aggregated = tree.is_aggregated();
        if aggregated {
            tracing::debug!("aggregation detected, wrapping query");
            let mut outer = Query::select();
            outer
                .column((Alias::new(WRAP_ALIAS), Asterisk))
                .from_subquery(statement, Alias::new(WRAP_ALIAS));
            if let Some(clause) = tree.where_clause(ExpressionMode::External) {
                tracing::debug!(clause = %clause, "external where applied");
                outer.and_where(Expr::cust(clause));
            }
            statement = outer;
        }

        let order = self.resolve_sort(sort, aggregated)?;
        tracing::debug!(sorts = order.len(), "sort applied");

        Ok(PreparedQuery {
            statement,
            parameters,
            order,
            platform: self.platform,
            limits: self.limits,
            aggregated,
        })
    }

    /// Sort expressions in order; a repeated field keeps its first position
    /// and takes its last direction.
    fn resolve_sort(&self, sort: &[SortSpec], wrapped: bool) -> SpsResult<Vec<(String, SortDirection)>> {
        let mut order: Vec<(String, SortDirection)> = Vec::with_capacity(sort.len());
        for spec in sort {
            let Some(field) = self.catalog.get(&spec.field).filter(|f| f.sortable) else {
                return Err(SpsError::validation(format!(
                    "sort by \"{}\" is not allowed",
                    spec.field
                )));
            };
            let direction = SortDirection::parse(&spec.field, spec.direction.as_deref())?;
            let expression = field.sort_expression(wrapped);
            match order.iter_mut().find(|(e, _)| *e == expression) {
                Some(slot) => slot.1 = direction,
                None => order.push((expression, direction)),
            }
        }
        Ok(order)
    }

    /// Prepare and fetch one page.
    pub async fn get_result(
        &self,
        executor: &dyn QueryExecutor,
        request: &ListRequest,
    ) -> SpsResult<ListResult> {
        self.prepare(&request.filters, &request.sort)?
            .fetch(executor, &request.page)
            .await
    }
}

/// A validated, compiled list query ready to paginate.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    /// Filtered statement without ordering or limits.
    statement: SelectStatement,
    parameters: Parameters,
    order: Vec<(String, SortDirection)>,
    platform: Platform,
    limits: PageLimits,
    aggregated: bool,
}

impl PreparedQuery {
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Whether the base query was wrapped for aggregated filters.
    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }

    /// Resolved ORDER BY expressions.
    pub fn order(&self) -> &[(String, SortDirection)] {
        &self.order
    }

    /// Filtered SQL with named placeholders, without order or limits.
    pub fn sql(&self) -> String {
        self.platform.render(&self.statement)
    }

    /// Ordered page statement fetching one row past the page.
    pub fn page_statement(&self, page: u64, items_per_page: u64) -> SpsResult<BoundStatement> {
        let items_per_page = self.limits.check(page, items_per_page)?;
        self.bound_page(page, items_per_page)
    }

    fn bound_page(&self, page: u64, items_per_page: u64) -> SpsResult<BoundStatement> {
        let offset = page_offset(page, items_per_page)?;
        let mut statement = self.statement.clone();
        for (expression, direction) in &self.order {
            match self.platform.null_ordering(*direction) {
                Some(nulls) => {
                    statement.order_by_expr_with_nulls(
                        Expr::cust(expression.clone()),
                        direction.to_order(),
                        nulls,
                    );
                }
                None => {
                    statement.order_by_expr(Expr::cust(expression.clone()), direction.to_order());
                }
            }
        }
        statement
            .offset(offset)
            .limit(items_per_page.saturating_add(1));

        let sql = self.platform.render(&statement);
        tracing::debug!(sql = %sql, page, items_per_page, "paginated");
        Ok(self.platform.bind(&sql, &self.parameters))
    }

    /// `COUNT(*)` over the filtered statement.
    pub fn count_statement(&self) -> BoundStatement {
        let mut count = Query::select();
        count
            .expr(Expr::col(Asterisk).count())
            .from_subquery(self.statement.clone(), Alias::new(WRAP_ALIAS));
        let sql = self.platform.render(&count);
        self.platform.bind(&sql, &self.parameters)
    }

    /// Fetch one page and build its navigation metadata.
    pub async fn fetch(
        &self,
        executor: &dyn QueryExecutor,
        request: &PageRequest,
    ) -> SpsResult<ListResult> {
        let requested = request
            .items_per_page
            .unwrap_or(self.limits.default_items_per_page);
        let items_per_page = self.limits.check(request.page, requested)?;
        let statement = self.bound_page(request.page, items_per_page)?;

        let mut data = executor.fetch_rows(&statement).await?;
        let more = data.len() as u64 > items_per_page;
        if more {
            data.truncate(items_per_page as usize);
        }

        if !request.navigation {
            return Ok(ListResult {
                data,
                navigation: None,
            });
        }

        let mut navigation = Navigation {
            items_per_page,
            page: request.page,
            more,
            items_on_page: data.len() as u64,
            total_items: None,
            total_pages: None,
        };

        if request.total_count {
            let total = if request.page != 1 || more {
                let counted = executor.fetch_count(&self.count_statement()).await?;
                u64::try_from(counted).unwrap_or(0)
            } else {
                data.len() as u64
            };
            tracing::debug!(total, "count computed");
            navigation.total_items = Some(total);
            navigation.total_pages = Some(total.div_ceil(items_per_page));
        }

        Ok(ListResult {
            data,
            navigation: Some(navigation),
        })
    }
}
