// SPDX-License-Identifier: MIT OR Apache-2.0
//! fg-policy
#![deny(unsafe_code)]

//! Policy trees for fieldgate.
//!
//! A [`PolicyTree`] maps `(type, field)` to exactly one rule and falls back
//! to a fixed rule (deny) for anything it does not list. Two authoring
//! styles produce one: [`flat::policy`] states every path directly, while
//! [`roles`] states per-role grants that [`compose::rbac`] folds together.

pub mod compose;
pub mod facts;
pub mod flat;
pub mod roles;
pub mod rules;
pub mod tree;

pub use compose::{RolePolicySet, RuleTree, gate, or_merge, rbac};
pub use facts::Facts;
pub use rules::{Check, Reference};
pub use tree::{ShapeMismatch, Tree, TreeError, TreeNode, merge_with};

use fg_rule_engine::Rule;
use tracing::info;

/// Errors raised while building a [`PolicyTree`]. All of them are authoring
/// bugs and must stop startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// Two merged trees disagree on the shape of a path.
    #[error(transparent)]
    Shape(#[from] ShapeMismatch),
    /// The tree is not a `type -> field -> rule` mapping.
    #[error("malformed policy at '{path}': {reason}")]
    Malformed {
        /// Offending path.
        path: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<TreeError> for PolicyError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::Shape(shape) => Self::Shape(shape),
            TreeError::Duplicate { path } => Self::Malformed {
                path,
                reason: "declared more than once".into(),
            },
            TreeError::EmptyPath => Self::Malformed {
                path: String::new(),
                reason: "empty path".into(),
            },
        }
    }
}

/// An immutable `type -> field -> rule` mapping with a fallback rule.
#[derive(Debug, Clone)]
pub struct PolicyTree {
    rules: RuleTree,
    fallback: Rule<Facts>,
}

impl PolicyTree {
    /// Validate `rules` and wrap them with the default fallback, [`Rule::Deny`].
    pub fn new(rules: RuleTree) -> Result<Self, PolicyError> {
        validate(&rules)?;
        Ok(Self {
            rules,
            fallback: Rule::Deny,
        })
    }

    /// The flat authoring style.
    pub fn flat() -> Result<Self, PolicyError> {
        let tree = Self::new(flat::policy()?)?;
        info!(style = "flat", paths = tree.len(), "policy tree built");
        Ok(tree)
    }

    /// The role-composed authoring style.
    pub fn role_based() -> Result<Self, PolicyError> {
        let tree = Self::new(roles::policy()?)?;
        info!(style = "role_based", paths = tree.len(), "policy tree built");
        Ok(tree)
    }

    /// Replace the rule used for unlisted paths.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Rule<Facts>) -> Self {
        self.fallback = fallback;
        self
    }

    /// The rule governing `type_name.field`, or the fallback.
    pub fn lookup(&self, type_name: &str, field: &str) -> &Rule<Facts> {
        self.get(type_name, field).unwrap_or(&self.fallback)
    }

    /// The rule listed for `type_name.field`, if any.
    pub fn get(&self, type_name: &str, field: &str) -> Option<&Rule<Facts>> {
        self.rules.leaf(&[type_name, field])
    }

    /// Rule applied to paths the tree does not list.
    pub fn fallback(&self) -> &Rule<Facts> {
        &self.fallback
    }

    /// Every listed `(type, field)` pair, sorted.
    pub fn paths(&self) -> Vec<(String, String)> {
        self.rules
            .leaves()
            .into_iter()
            .filter_map(|(path, _)| match path.as_slice() {
                [ty, field] => Some(((*ty).to_string(), (*field).to_string())),
                _ => None,
            })
            .collect()
    }

    /// Every rule rendered as an expression string.
    pub fn describe(&self) -> Tree<String> {
        self.rules.map_leaves_ref(Rule::describe)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &RuleTree {
        &self.rules
    }
}

fn validate(rules: &RuleTree) -> Result<(), PolicyError> {
    for (ty, node) in rules.entries() {
        let malformed = |path: String, reason: &str| PolicyError::Malformed {
            path,
            reason: reason.to_string(),
        };
        if ty.is_empty() {
            return Err(malformed(ty.clone(), "empty type name"));
        }
        let TreeNode::Branch(fields) = node else {
            return Err(malformed(ty.clone(), "type maps directly to a rule"));
        };
        for (field, child) in fields {
            let path = format!("{ty}.{field}");
            if field.is_empty() {
                return Err(malformed(path, "empty field name"));
            }
            if let TreeNode::Branch(_) = child {
                return Err(malformed(path, "field maps to a nested mapping"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{allow, deny};

    #[test]
    fn lookup_falls_back_to_deny() {
        let rules = Tree::from_sections([("Query", vec![("events", allow())])]).unwrap();
        let tree = PolicyTree::new(rules).unwrap();
        assert_eq!(tree.lookup("Query", "events").describe(), "allow");
        assert_eq!(tree.lookup("Query", "nope").describe(), "deny");
        assert_eq!(tree.lookup("Nope", "events").describe(), "deny");
        assert_eq!(tree.lookup("", "").describe(), "deny");
    }

    #[test]
    fn fallback_is_configurable() {
        let tree = PolicyTree::new(Tree::new()).unwrap().with_fallback(allow());
        assert_eq!(tree.lookup("User", "name").describe(), "allow");
        assert_eq!(tree.fallback().describe(), "allow");
        assert_eq!(PolicyTree::flat().unwrap().fallback().describe(), "deny");
    }

    #[test]
    fn type_level_leaf_is_malformed() {
        let mut rules = RuleTree::new();
        rules.insert(&["Query"], allow()).unwrap();
        let err = PolicyTree::new(rules).unwrap_err();
        assert!(matches!(err, PolicyError::Malformed { ref path, .. } if path == "Query"));
    }

    #[test]
    fn nested_field_is_malformed() {
        let mut rules = RuleTree::new();
        rules.insert(&["Event", "title", "inner"], allow()).unwrap();
        let err = PolicyTree::new(rules).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed policy at 'Event.title': field maps to a nested mapping"
        );
    }

    #[test]
    fn duplicate_declaration_is_malformed() {
        let err = Tree::from_sections([("Event", vec![("title", allow()), ("title", deny())])])
            .map_err(PolicyError::from)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed policy at 'Event.title': declared more than once"
        );
    }

    #[test]
    fn hidden_type_level_leaf_is_a_shape_error() {
        let mut rules = RuleTree::new();
        rules.insert(&["Event"], allow()).unwrap();
        let err = PolicyError::from(rules.insert(&["Event", "title"], deny()).unwrap_err());
        assert!(matches!(err, PolicyError::Shape(ref m) if m.path == "Event"));
    }

    #[test]
    fn both_styles_build() {
        let flat = PolicyTree::flat().unwrap();
        let composed = PolicyTree::role_based().unwrap();
        assert_eq!(flat.paths(), composed.paths());
        assert!(flat.get("Mutation", "review").is_some());
    }
}
