//! Filter expression compiler.
//!
//! Turns nested client filter specifications into a tree of predicates and
//! groups, compiled into a parameterized boolean expression plus a bag of
//! named parameters.

pub mod group;
pub mod hooks;
pub mod operator;
pub mod predicate;
pub mod tree;
pub mod value;

pub use group::{Group, trim_connective};
pub use hooks::{ExpressionRenderer, LowerRenderer, LowercaseTransform, PredicateView, ValueTransform};
pub use operator::{Operator, OperatorCategory};
pub use predicate::{BoolOperator, ExpressionMode, Predicate};
pub use tree::{FilterNode, FilterTree};
pub use value::{ParamValue, Parameters};
