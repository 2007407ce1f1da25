//! Boolean groups of filter nodes.

use super::predicate::{BoolOperator, ExpressionMode};
use super::tree::FilterNode;
use super::value::Parameters;

/// Children joined by their own connectives, compiled as `{bool} (...)`.
#[derive(Debug, Clone, Default)]
pub struct Group {
    sequential_number: u32,
    bool_operator: BoolOperator,
    children: Vec<FilterNode>,
}

impl Group {
    pub fn new(sequential_number: u32, bool_operator: BoolOperator) -> Self {
        Self {
            sequential_number,
            bool_operator,
            children: Vec::new(),
        }
    }

    pub fn push(&mut self, child: FilterNode) {
        self.children.push(child);
    }

    pub fn sequential_number(&self) -> u32 {
        self.sequential_number
    }

    pub fn bool_operator(&self) -> BoolOperator {
        self.bool_operator
    }

    pub fn children(&self) -> &[FilterNode] {
        &self.children
    }

    /// Compile every child, strip the first connective and parenthesize.
    ///
    /// Returns `None` when no child contributes to this pass.
    pub fn compile(&self, mode: ExpressionMode) -> Option<String> {
        let fragments: Vec<String> = self
            .children
            .iter()
            .filter_map(|child| child.compile(mode))
            .collect();
        if fragments.is_empty() {
            return None;
        }
        let joined = fragments.join(" ");
        Some(format!("{} ({})", self.bool_operator, trim_connective(&joined)))
    }

    pub fn is_aggregated(&self) -> bool {
        self.children.iter().any(FilterNode::is_aggregated)
    }

    /// Parameters of all descendants, in traversal order.
    pub fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        for child in &self.children {
            params.extend(child.parameters());
        }
        params
    }
}

/// Strip one leading `AND ` / `OR ` (any case) from a fragment.
pub fn trim_connective(fragment: &str) -> &str {
    let fragment = fragment.trim_start();
    for connective in ["and ", "or "] {
        if let Some(head) = fragment.get(..connective.len())
            && head.eq_ignore_ascii_case(connective)
        {
            return fragment[connective.len()..].trim_start();
        }
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_one_connective() {
        assert_eq!(trim_connective("AND a = 1"), "a = 1");
        assert_eq!(trim_connective("  or (a = 1)"), "(a = 1)");
        assert_eq!(trim_connective("AND AND a"), "AND a");
        assert_eq!(trim_connective("android = 1"), "android = 1");
        assert_eq!(trim_connective("ordinal > 2"), "ordinal > 2");
    }

    #[test]
    fn empty_group_compiles_to_nothing() {
        let group = Group::new(0, BoolOperator::And);
        assert!(group.compile(ExpressionMode::Internal).is_none());
        assert!(group.parameters().is_empty());
        assert!(!group.is_aggregated());
    }
}
