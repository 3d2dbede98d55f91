// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-request evaluation: decisions and guarded resolution.

use crate::AuthorizationGate;
use crate::error::GateError;
use fg_core::{Args, Caller, Record, RequestContext};
use fg_error::{ErrorCode, FgError};
use fg_policy::Facts;
use fg_rule_engine::{Evaluation, Evaluator, RequestCache};
use fg_telemetry::{DecisionOutcome, DecisionRecord};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Why a field was withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    /// A predicate needed a caller and the request is anonymous.
    AuthenticationRequired,
    /// The rule evaluated false.
    NotAuthorised,
}

impl Denial {
    /// Stable error code for this denial.
    pub fn code(&self) -> ErrorCode {
        match self {
            Denial::AuthenticationRequired => ErrorCode::AuthenticationRequired,
            Denial::NotAuthorised => ErrorCode::AuthorizationDenied,
        }
    }

    /// Field-level error the execution engine places in the response.
    pub fn to_error(&self, site: &str) -> FgError {
        FgError::new(self.code(), self.to_string()).with_context("site", site)
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::AuthenticationRequired => f.write_str("must be logged in"),
            Denial::NotAuthorised => f.write_str("not authorised"),
        }
    }
}

/// The answer for one `(type, field)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// `Type.field` that was checked.
    pub site: String,
    /// Whether the field may be resolved.
    pub allowed: bool,
    /// Set exactly when `allowed` is false.
    pub denial: Option<Denial>,
    /// Evaluation counters.
    pub evaluation: Evaluation,
    /// The denied rule's expression; only filled in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of a guarded resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome<T> {
    /// The resolver ran and produced a value.
    Resolved(T),
    /// The resolver was not run.
    Denied(Denial),
}

impl<T> FieldOutcome<T> {
    /// The value, dropping the denial reason.
    pub fn into_option(self) -> Option<T> {
        match self {
            FieldOutcome::Resolved(v) => Some(v),
            FieldOutcome::Denied(_) => None,
        }
    }

    /// Whether the resolver ran.
    pub fn is_resolved(&self) -> bool {
        matches!(self, FieldOutcome::Resolved(_))
    }

    /// Why the resolver did not run.
    pub fn denial(&self) -> Option<Denial> {
        match self {
            FieldOutcome::Resolved(_) => None,
            FieldOutcome::Denied(d) => Some(*d),
        }
    }
}

/// Evaluation context of one request.
///
/// Holds the immutable [`RequestContext`] and the request's private
/// per-request cache. Checks take `&self`, so sibling fields may be checked
/// concurrently.
pub struct RequestScope {
    gate: AuthorizationGate,
    ctx: Arc<RequestContext>,
    cache: RequestCache,
    deadline: Option<tokio::time::Instant>,
}

impl RequestScope {
    pub(crate) fn new(gate: AuthorizationGate, caller: Option<Caller>) -> Self {
        let deadline = gate
            .options
            .request_timeout
            .map(|t| tokio::time::Instant::now() + t);
        Self {
            gate,
            ctx: Arc::new(RequestContext::for_caller(caller)),
            cache: RequestCache::new(),
            deadline,
        }
    }

    /// The request's context.
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// Decide whether `type_name.field` may be resolved for this request.
    ///
    /// A `false` rule is a normal [`Decision`]; only a failed record lookup
    /// or an expired deadline is an error.
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            type_name = %type_name,
            field_name = %field,
            request_id = %self.ctx.request_id,
        )
    )]
    pub async fn check(
        &self,
        type_name: &str,
        field: &str,
        args: &Args,
        parent: Option<&Record>,
    ) -> Result<Decision, FgError> {
        let site = format!("{type_name}.{field}");
        let started = Instant::now();
        let result = self.evaluate(type_name, field, &site, args, parent).await;
        let elapsed = started.elapsed();

        let outcome = match &result {
            Ok(d) if d.allowed => DecisionOutcome::Allowed,
            Ok(Decision {
                denial: Some(Denial::AuthenticationRequired),
                ..
            }) => DecisionOutcome::AuthenticationRequired,
            Ok(_) => DecisionOutcome::Denied,
            Err(_) => DecisionOutcome::Failed,
        };
        if let Some(collector) = &self.gate.options.collector {
            let evaluation = result.as_ref().map(|d| d.evaluation).unwrap_or_default();
            collector.record(DecisionRecord {
                site: site.clone(),
                outcome,
                duration_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                predicate_calls: evaluation.predicate_calls,
                cache_hits: evaluation.cache_hits,
            });
        }

        result.map_err(|err| {
            warn!(site = %site, error = %err, "authorization check failed; field withheld");
            FgError::from(err)
        })
    }

    async fn evaluate(
        &self,
        type_name: &str,
        field: &str,
        site: &str,
        args: &Args,
        parent: Option<&Record>,
    ) -> Result<Decision, GateError> {
        let rule = self.gate.tree.lookup(type_name, field);
        let facts = Facts::new(
            self.ctx.clone(),
            Arc::new(args.clone()),
            parent.cloned().map(Arc::new),
            self.gate.store.clone(),
        );

        let mut evaluator = Evaluator::new(&self.cache);
        if self.gate.options.strict_cache {
            evaluator = evaluator.with_strict(&self.gate.strict);
        }
        let evaluating = evaluator.evaluate(rule, site, &facts);

        let evaluation = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, evaluating)
                .await
                .map_err(|_| GateError::TimedOut {
                    site: site.to_string(),
                })??,
            None => evaluating.await?,
        };

        let denial = if evaluation.allowed {
            None
        } else if evaluation.identity_required && !self.ctx.is_logged_in() {
            Some(Denial::AuthenticationRequired)
        } else {
            Some(Denial::NotAuthorised)
        };
        let reason = match denial {
            Some(_) if self.gate.options.debug => Some(rule.describe()),
            _ => None,
        };
        debug!(
            site,
            allowed = evaluation.allowed,
            calls = evaluation.predicate_calls,
            hits = evaluation.cache_hits,
            "decision"
        );

        Ok(Decision {
            site: site.to_string(),
            allowed: evaluation.allowed,
            denial,
            evaluation,
            reason,
        })
    }

    /// Run `resolver` only if `type_name.field` is allowed.
    ///
    /// On denial the resolver is never polled, so it cannot have side
    /// effects.
    pub async fn resolve<T, F, Fut>(
        &self,
        type_name: &str,
        field: &str,
        args: &Args,
        parent: Option<&Record>,
        resolver: F,
    ) -> Result<FieldOutcome<T>, FgError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let decision = self.check(type_name, field, args, parent).await?;
        match decision.denial {
            None => Ok(FieldOutcome::Resolved(resolver().await)),
            Some(denial) => Ok(FieldOutcome::Denied(denial)),
        }
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("ctx", &self.ctx)
            .field("cached", &self.cache.len())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
