// SPDX-License-Identifier: MIT OR Apache-2.0
//! Composing rule trees: OR/AND merges, role gating and the RBAC fold.

use crate::facts::Facts;
use crate::rules::caller_has_role;
use crate::tree::{ShapeMismatch, Tree, merge_with};
use fg_core::Role;
use fg_rule_engine::Rule;
use std::collections::BTreeMap;
use std::iter;

/// A tree of rules over [`Facts`].
pub type RuleTree = Tree<Rule<Facts>>;

// ---------------------------------------------------------------------------
// Expression shorthands
// ---------------------------------------------------------------------------

/// `Rule::Allow`.
pub fn allow() -> Rule<Facts> {
    Rule::Allow
}

/// `Rule::Deny`.
pub fn deny() -> Rule<Facts> {
    Rule::Deny
}

/// Disjunction.
pub fn or<const N: usize>(rules: [Rule<Facts>; N]) -> Rule<Facts> {
    Rule::any(rules)
}

/// Conjunction.
pub fn and<const N: usize>(rules: [Rule<Facts>; N]) -> Rule<Facts> {
    Rule::all(rules)
}

/// Negation.
pub fn not(rule: Rule<Facts>) -> Rule<Facts> {
    Rule::negate(rule)
}

// ---------------------------------------------------------------------------
// Merges
// ---------------------------------------------------------------------------

/// Merge trees, OR-combining colliding leaves.
pub fn or_merge(trees: impl IntoIterator<Item = RuleTree>) -> Result<RuleTree, ShapeMismatch> {
    merge_with(trees, Rule::Or)
}

/// Merge trees, AND-combining colliding leaves.
pub fn and_merge(trees: impl IntoIterator<Item = RuleTree>) -> Result<RuleTree, ShapeMismatch> {
    merge_with(trees, Rule::And)
}

/// Conjoin every leaf of `tree` with `guard`, guard first.
pub fn gate_with(tree: RuleTree, guard: &Rule<Facts>) -> Result<RuleTree, ShapeMismatch> {
    let guards = tree.map_leaves_ref(|_| guard.clone());
    and_merge([guards, tree])
}

/// Restrict every leaf of `tree` to callers holding `role`.
pub fn gate(tree: RuleTree, role: Role) -> Result<RuleTree, ShapeMismatch> {
    gate_with(tree, &caller_has_role(role))
}

// ---------------------------------------------------------------------------
// RolePolicySet
// ---------------------------------------------------------------------------

/// One partial tree per role plus an ungated defaults tree.
///
/// Each role's tree must already include whatever it inherits; the fold in
/// [`rbac`] knows nothing about role ranks.
#[derive(Debug, Clone, Default)]
pub struct RolePolicySet {
    /// Applies to every caller, including anonymous ones.
    pub defaults: RuleTree,
    /// Grants per role.
    pub roles: BTreeMap<Role, RuleTree>,
}

impl RolePolicySet {
    /// A set holding only `defaults`.
    pub fn new(defaults: RuleTree) -> Self {
        Self {
            defaults,
            roles: BTreeMap::new(),
        }
    }

    /// Builder: set the tree for `role`.
    #[must_use]
    pub fn with_role(mut self, role: Role, tree: RuleTree) -> Self {
        self.roles.insert(role, tree);
        self
    }
}

/// Fold a [`RolePolicySet`] into one tree: every role tree is gated on its
/// role, then all of them and the defaults are OR-merged.
pub fn rbac(set: RolePolicySet) -> Result<RuleTree, ShapeMismatch> {
    let mut gated = Vec::with_capacity(set.roles.len() + 1);
    for (role, tree) in set.roles {
        gated.push(gate(tree, role)?);
    }
    or_merge(gated.into_iter().chain(iter::once(set.defaults)))
}
