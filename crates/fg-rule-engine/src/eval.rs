// SPDX-License-Identifier: MIT OR Apache-2.0
//! Short-circuiting evaluation of [`Rule`] expressions.

use crate::cache::{Fingerprint, LeafOutcome, RequestCache, StrictCache};
use crate::{CachePolicy, Leaf, PredicateError, Rule};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tracing::debug;

/// The outcome of evaluating one rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// Final boolean decision.
    pub allowed: bool,
    /// Some visited leaf was false only because the caller was anonymous.
    pub identity_required: bool,
    /// Predicates actually invoked.
    pub predicate_calls: u32,
    /// Leaves answered from a cache.
    pub cache_hits: u32,
}

/// Evaluation failed for a reason other than a decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// A predicate's external lookup failed in transport.
    #[error("predicate '{predicate}' at {site} failed: {source}")]
    Predicate {
        /// Name of the failing predicate.
        predicate: String,
        /// `Type.field` being checked.
        site: String,
        /// The underlying failure.
        source: PredicateError,
    },
}

enum Scope<'c> {
    Request,
    Strict(&'c StrictCache, String),
}

/// Walks a rule against one input, consulting and filling caches.
///
/// Without a [`StrictCache`], `Strict` leaves are cached per request.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'c> {
    request: &'c RequestCache,
    strict: Option<&'c StrictCache>,
}

impl<'c> Evaluator<'c> {
    /// Evaluator using `request` for per-request caching only.
    #[must_use]
    pub fn new(request: &'c RequestCache) -> Self {
        Self {
            request,
            strict: None,
        }
    }

    /// Enable process-wide caching for `Strict` leaves.
    #[must_use]
    pub fn with_strict(mut self, strict: &'c StrictCache) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Evaluate `rule` at `site` (`Type.field`) against `input`.
    pub async fn evaluate<I>(
        &self,
        rule: &Rule<I>,
        site: &str,
        input: &I,
    ) -> Result<Evaluation, EvalError>
    where
        I: Fingerprint + Sync,
    {
        let mut stats = Evaluation::default();
        let allowed = self.walk(rule, site, input, &mut stats).await?;
        stats.allowed = allowed;
        Ok(stats)
    }

    fn walk<'a, I>(
        &'a self,
        rule: &'a Rule<I>,
        site: &'a str,
        input: &'a I,
        stats: &'a mut Evaluation,
    ) -> BoxFuture<'a, Result<bool, EvalError>>
    where
        I: Fingerprint + Sync,
    {
        async move {
            match rule {
                Rule::Allow => Ok(true),
                Rule::Deny => Ok(false),
                Rule::Leaf(leaf) => self.leaf(leaf, site, input, stats).await,
                Rule::And(rules) => {
                    for r in rules {
                        if !self.walk(r, site, input, stats).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                Rule::Or(rules) => {
                    for r in rules {
                        if self.walk(r, site, input, stats).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Rule::Not(inner) => Ok(!self.walk(inner, site, input, stats).await?),
            }
        }
        .boxed()
    }

    async fn leaf<I>(
        &self,
        leaf: &Leaf<I>,
        site: &str,
        input: &I,
        stats: &mut Evaluation,
    ) -> Result<bool, EvalError>
    where
        I: Fingerprint + Sync,
    {
        let name = leaf.name();
        let scope = match (leaf.cache, self.strict) {
            (CachePolicy::None, _) => None,
            (CachePolicy::PerRequest, _) | (CachePolicy::Strict, None) => Some(Scope::Request),
            (CachePolicy::Strict, Some(strict)) => {
                input.fingerprint().map(|fp| Scope::Strict(strict, fp))
            }
        };

        let cached = match &scope {
            None => None,
            Some(Scope::Request) => self.request.get(site, name),
            Some(Scope::Strict(strict, fp)) => strict.get(fp, name),
        };

        let outcome = match cached {
            Some(hit) => {
                stats.cache_hits += 1;
                debug!(site, predicate = name, value = hit.value, "leaf cache hit");
                hit
            }
            None => {
                stats.predicate_calls += 1;
                let outcome = match leaf.predicate.test(input).await {
                    Ok(value) => LeafOutcome {
                        value,
                        identity_required: false,
                    },
                    Err(PredicateError::Unauthenticated) => LeafOutcome {
                        value: false,
                        identity_required: true,
                    },
                    Err(source) => {
                        return Err(EvalError::Predicate {
                            predicate: name.to_string(),
                            site: site.to_string(),
                            source,
                        });
                    }
                };
                debug!(site, predicate = name, value = outcome.value, "predicate evaluated");
                match &scope {
                    None => {}
                    Some(Scope::Request) => self.request.insert(site, name, outcome),
                    Some(Scope::Strict(strict, fp)) => strict.insert(fp, name, outcome),
                }
                outcome
            }
        };

        if outcome.identity_required {
            stats.identity_required = true;
        }
        Ok(outcome.value)
    }
}
