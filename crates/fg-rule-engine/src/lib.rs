// SPDX-License-Identifier: MIT OR Apache-2.0
//! fg-rule-engine
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Boolean rule expressions over async predicates.
//!
//! A [`Rule`] is a finite expression tree: constants, predicate leaves and
//! the `and`/`or`/`not` combinators. Rules are built once and shared
//! read-only; all per-evaluation state lives in the caches handed to the
//! [`Evaluator`].

mod cache;
mod eval;

pub use cache::{CacheKey, Fingerprint, LeafOutcome, RequestCache, StrictCache};
pub use eval::{EvalError, Evaluation, Evaluator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How long the outcome of a leaf may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Re-evaluate on every visit.
    #[default]
    None,
    /// Reuse within one request, keyed by site and predicate.
    PerRequest,
    /// Reuse across requests for structurally identical inputs.
    Strict,
}

/// Why a predicate could not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredicateError {
    /// The check needs a caller identity and the request has none.
    /// Evaluates to `false`.
    #[error("must be logged in")]
    Unauthenticated,
    /// An external lookup failed in transport. Fails the request.
    #[error("lookup failed: {0}")]
    Lookup(String),
}

/// A named check over the evaluation input `I`.
///
/// "Record not found" is an answer (`Ok(false)`), not an error.
#[async_trait]
pub trait Predicate<I>: Send + Sync {
    /// Stable name, used as part of cache keys and in diagnostics.
    fn name(&self) -> &str;

    /// Run the check.
    async fn test(&self, input: &I) -> Result<bool, PredicateError>;
}

/// A predicate plus the caching discipline attached to it.
pub struct Leaf<I> {
    /// The check.
    pub predicate: Arc<dyn Predicate<I>>,
    /// How its outcome may be reused.
    pub cache: CachePolicy,
}

impl<I> Clone for Leaf<I> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
            cache: self.cache,
        }
    }
}

impl<I> Leaf<I> {
    /// Predicate name.
    pub fn name(&self) -> &str {
        self.predicate.name()
    }
}

/// A boolean rule expression.
pub enum Rule<I> {
    /// Always true.
    Allow,
    /// Always false.
    Deny,
    /// A predicate check.
    Leaf(Leaf<I>),
    /// True when every sub-rule is true; the empty conjunction is true.
    And(Vec<Rule<I>>),
    /// True when any sub-rule is true; the empty disjunction is false.
    Or(Vec<Rule<I>>),
    /// Negation of the sub-rule.
    Not(Box<Rule<I>>),
}

impl<I> Clone for Rule<I> {
    fn clone(&self) -> Self {
        match self {
            Self::Allow => Self::Allow,
            Self::Deny => Self::Deny,
            Self::Leaf(l) => Self::Leaf(l.clone()),
            Self::And(rs) => Self::And(rs.clone()),
            Self::Or(rs) => Self::Or(rs.clone()),
            Self::Not(r) => Self::Not(r.clone()),
        }
    }
}

impl<I> Rule<I> {
    /// Leaf rule wrapping `predicate`.
    pub fn leaf<P>(predicate: P, cache: CachePolicy) -> Self
    where
        P: Predicate<I> + 'static,
    {
        Self::Leaf(Leaf {
            predicate: Arc::new(predicate),
            cache,
        })
    }

    /// Conjunction of `rules`.
    pub fn all(rules: impl IntoIterator<Item = Rule<I>>) -> Self {
        Self::And(rules.into_iter().collect())
    }

    /// Disjunction of `rules`.
    pub fn any(rules: impl IntoIterator<Item = Rule<I>>) -> Self {
        Self::Or(rules.into_iter().collect())
    }

    /// Negation of `rule`.
    pub fn negate(rule: Rule<I>) -> Self {
        Self::Not(Box::new(rule))
    }

    /// Render the expression, e.g. `or(not(parent_is_private), allow)`.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.write_expr(&mut out);
        out
    }

    fn write_expr(&self, out: &mut String) {
        let (name, children) = match self {
            Self::Allow => return out.push_str("allow"),
            Self::Deny => return out.push_str("deny"),
            Self::Leaf(l) => return out.push_str(l.name()),
            Self::Not(r) => {
                out.push_str("not(");
                r.write_expr(out);
                return out.push(')');
            }
            Self::And(rs) => ("and", rs),
            Self::Or(rs) => ("or", rs),
        };
        out.push_str(name);
        out.push('(');
        for (i, r) in children.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            r.write_expr(out);
        }
        out.push(')');
    }
}

impl<I> fmt::Debug for Rule<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl<I> fmt::Display for Rule<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Predicate<()> for Named {
        fn name(&self) -> &str {
            self.0
        }
        async fn test(&self, _: &()) -> Result<bool, PredicateError> {
            Ok(true)
        }
    }

    #[test]
    fn describe_nested_expression() {
        let rule: Rule<()> = Rule::any([
            Rule::negate(Rule::leaf(Named("parent_is_private"), CachePolicy::None)),
            Rule::all([Rule::Allow, Rule::Deny]),
        ]);
        assert_eq!(
            rule.describe(),
            "or(not(parent_is_private), and(allow, deny))"
        );
        assert_eq!(format!("{rule:?}"), rule.to_string());
    }

    #[test]
    fn empty_combinators_render() {
        let rule: Rule<()> = Rule::all([Rule::any([])]);
        assert_eq!(rule.describe(), "and(or())");
    }

    #[test]
    fn clone_shares_predicate() {
        let rule: Rule<()> = Rule::leaf(Named("p"), CachePolicy::PerRequest);
        let copy = rule.clone();
        match (&rule, &copy) {
            (Rule::Leaf(a), Rule::Leaf(b)) => {
                assert!(Arc::ptr_eq(&a.predicate, &b.predicate));
                assert_eq!(b.cache, CachePolicy::PerRequest);
            }
            _ => panic!("expected leaves"),
        }
    }

    #[test]
    fn cache_policy_serde_snake_case() {
        let s = serde_json::to_string(&CachePolicy::PerRequest).unwrap();
        assert_eq!(s, "\"per_request\"");
    }
}
