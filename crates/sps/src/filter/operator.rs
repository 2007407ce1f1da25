//! Comparison operator catalog.
//!
//! Maps the client-facing operator tokens (`equals`, `between`,
//! `contains`, ...) to SQL operator text and groups them by category.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SpsError, SpsResult};

/// Comparison operators accepted in filter specifications.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    IsNull,
    IsNotNull,
    In,
    NotIn,
    /// Prefix match (LIKE value%).
    BeginsWith,
    /// Suffix match (LIKE %value).
    EndsWith,
    /// Substring match (LIKE %value%).
    Contains,
    NotBeginsWith,
    NotEndsWith,
    NotContains,
    /// Inclusive range; the value must be a two-element list.
    Between,
    NotBetween,
}

/// Operator categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCategory {
    /// LIKE-family operators; values are wrapped with `%` wildcards.
    StringOnly,
    /// Ordering and range operators.
    NumericOrDate,
    Equality,
    /// No value, no parameter.
    NullCheck,
    /// IN / NOT IN; the value must be a list.
    SetMembership,
}

impl Operator {
    /// Every operator in the catalog, in token order.
    pub const ALL: [Operator; 18] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::In,
        Operator::NotIn,
        Operator::BeginsWith,
        Operator::EndsWith,
        Operator::Contains,
        Operator::NotBeginsWith,
        Operator::NotEndsWith,
        Operator::NotContains,
        Operator::Between,
        Operator::NotBetween,
    ];

    /// Parse a client token, rejecting anything outside the catalog.
    pub fn from_token(token: &str) -> SpsResult<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.token() == token)
            .ok_or_else(|| {
                SpsError::configuration(format!("comparison operator \"{token}\" is not supported"))
            })
    }

    /// Client-facing token.
    pub fn token(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::GreaterThan => "greater_than",
            Operator::GreaterThanOrEqual => "greater_than_or_equal",
            Operator::LessThan => "less_than",
            Operator::LessThanOrEqual => "less_than_or_equal",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::BeginsWith => "begins_with",
            Operator::EndsWith => "ends_with",
            Operator::Contains => "contains",
            Operator::NotBeginsWith => "not_begins_with",
            Operator::NotEndsWith => "not_ends_with",
            Operator::NotContains => "not_contains",
            Operator::Between => "between",
            Operator::NotBetween => "not_between",
        }
    }

    /// SQL operator text.
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::BeginsWith | Operator::EndsWith | Operator::Contains => "LIKE",
            Operator::NotBeginsWith | Operator::NotEndsWith | Operator::NotContains => "NOT LIKE",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
        }
    }

    pub fn category(self) -> OperatorCategory {
        match self {
            Operator::Equals | Operator::NotEquals => OperatorCategory::Equality,
            Operator::GreaterThan
            | Operator::GreaterThanOrEqual
            | Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::Between
            | Operator::NotBetween => OperatorCategory::NumericOrDate,
            Operator::IsNull | Operator::IsNotNull => OperatorCategory::NullCheck,
            Operator::In | Operator::NotIn => OperatorCategory::SetMembership,
            Operator::BeginsWith
            | Operator::EndsWith
            | Operator::Contains
            | Operator::NotBeginsWith
            | Operator::NotEndsWith
            | Operator::NotContains => OperatorCategory::StringOnly,
        }
    }

    pub fn is_null_check(self) -> bool {
        self.category() == OperatorCategory::NullCheck
    }

    pub fn is_set_membership(self) -> bool {
        self.category() == OperatorCategory::SetMembership
    }

    pub fn is_between(self) -> bool {
        matches!(self, Operator::Between | Operator::NotBetween)
    }

    /// Wrap a LIKE pattern with the wildcards this operator implies.
    ///
    /// Returns `None` for operators outside the LIKE family.
    pub fn wildcard(self, value: &str) -> Option<String> {
        match self {
            Operator::BeginsWith | Operator::NotBeginsWith => Some(format!("{value}%")),
            Operator::EndsWith | Operator::NotEndsWith => Some(format!("%{value}")),
            Operator::Contains | Operator::NotContains => Some(format!("%{value}%")),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
