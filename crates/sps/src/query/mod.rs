//! List query orchestration: skeleton, platform policy, execution and
//! pagination.

pub mod executor;
pub mod list;
pub mod platform;
pub mod skeleton;
pub mod types;

pub use executor::{PgExecutor, QueryExecutor, inline_text_literals};
pub use list::{ListQuery, MAX_ITEMS_PER_PAGE, PageLimits, PreparedQuery, WRAP_ALIAS};
pub use platform::{BoundStatement, ParamType, Platform};
pub use skeleton::{JoinType, QuerySkeleton, SkeletonJoin};
pub use types::{
    ListDefinition, ListRequest, ListResult, Navigation, PageRequest, Row, SortDirection,
    SortSpec,
};
