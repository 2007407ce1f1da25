//! Filter, sort and pagination compiler for list queries.
//!
//! Client requests describe filters as nested JSON groups of conditions over
//! an allow-listed set of fields. This crate validates them against a
//! [`FieldCatalog`], compiles them into a parameterized SQL expression, applies
//! them to a caller-owned [`QuerySkeleton`] and paginates the result with a
//! cheap "has more" probe and optional total counts.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod query;

pub use catalog::{CatalogHelp, FieldCatalog, FieldEntry, FieldOptions, FilterHelp};
pub use config::Config;
pub use error::{SpsError, SpsResult};
pub use filter::{
    BoolOperator, ExpressionMode, FilterNode, FilterTree, Operator, ParamValue, Parameters,
    PredicateView,
};
pub use query::{
    BoundStatement, ListDefinition, ListQuery, ListRequest, ListResult, Navigation, PageRequest,
    PgExecutor, Platform, PreparedQuery, QueryExecutor, QuerySkeleton, Row, SortDirection,
    SortSpec,
};
