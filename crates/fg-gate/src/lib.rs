// SPDX-License-Identifier: MIT OR Apache-2.0
//! fg-gate
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The authorization middleware. An [`AuthorizationGate`] owns the
//! immutable [`PolicyTree`], the record store and the process-wide strict
//! cache. Each incoming request opens a [`RequestScope`] via
//! [`AuthorizationGate::begin`]; the execution engine asks the scope about
//! every field it is about to resolve and only runs the resolver when the
//! answer is allow.

mod error;
mod scope;

pub use error::GateError;
pub use scope::{Decision, Denial, FieldOutcome, RequestScope};

use fg_config::{Fallback, FieldgateConfig, PolicyMode, validate_config};
use fg_core::{Args, Caller, Record};
use fg_error::FgError;
use fg_policy::PolicyTree;
use fg_rule_engine::{Rule, StrictCache};
use fg_store::RecordStore;
use fg_telemetry::DecisionCollector;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Knobs of one gate.
#[derive(Debug, Clone)]
pub struct GateOptions {
    /// Share `Strict` predicate results across requests.
    pub strict_cache: bool,
    /// Deadline for all checks of one request, measured from
    /// [`AuthorizationGate::begin`].
    pub request_timeout: Option<Duration>,
    /// Attach the denied rule's expression to decisions.
    pub debug: bool,
    /// Where to record per-check metrics.
    pub collector: Option<DecisionCollector>,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            strict_cache: true,
            request_timeout: None,
            debug: false,
            collector: None,
        }
    }
}

impl GateOptions {
    /// Options derived from a loaded configuration.
    pub fn from_config(config: &FieldgateConfig) -> Self {
        Self {
            strict_cache: config.strict_cache,
            request_timeout: config.request_timeout_ms.map(Duration::from_millis),
            debug: config.debug,
            collector: None,
        }
    }

    /// Record every decision into `collector`.
    #[must_use]
    pub fn with_collector(mut self, collector: DecisionCollector) -> Self {
        self.collector = Some(collector);
        self
    }
}

/// Evaluate-and-gate over one immutable policy tree.
///
/// Cloning is cheap; clones share the tree, the store and the strict cache.
#[derive(Clone)]
pub struct AuthorizationGate {
    tree: Arc<PolicyTree>,
    store: Arc<dyn RecordStore>,
    strict: Arc<StrictCache>,
    options: GateOptions,
}

impl AuthorizationGate {
    /// Gate over an already-built tree.
    pub fn new(tree: PolicyTree, store: Arc<dyn RecordStore>, options: GateOptions) -> Self {
        Self {
            tree: Arc::new(tree),
            store,
            strict: Arc::new(StrictCache::new()),
            options,
        }
    }

    /// Build the tree selected by `config` and wrap it.
    ///
    /// The config is validated first. Validation and construction errors
    /// are fatal: callers must not serve requests when this fails.
    pub fn from_config(
        config: &FieldgateConfig,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self, FgError> {
        validate_config(config)?;
        let tree = build_tree(config.policy_mode).map_err(GateError::from)?;
        let tree = match config.fallback {
            Fallback::Deny => tree,
            Fallback::Allow => tree.with_fallback(Rule::Allow),
        };
        info!(
            mode = %config.policy_mode,
            strict_cache = config.strict_cache,
            timeout_ms = config.request_timeout_ms,
            "authorization gate ready"
        );
        Ok(Self::new(tree, store, GateOptions::from_config(config)))
    }

    /// Open the evaluation context of one request.
    pub fn begin(&self, caller: Option<Caller>) -> RequestScope {
        RequestScope::new(self.clone(), caller)
    }

    /// One-shot check outside any request scope: allow or deny.
    pub async fn evaluate_and_gate(
        &self,
        type_name: &str,
        field: &str,
        caller: Option<Caller>,
        args: &Args,
        parent: Option<&Record>,
    ) -> Result<bool, FgError> {
        let decision = self.begin(caller).check(type_name, field, args, parent).await?;
        Ok(decision.allowed)
    }

    /// The effective tree.
    pub fn policy(&self) -> &PolicyTree {
        &self.tree
    }

    /// The options this gate was built with.
    pub fn options(&self) -> &GateOptions {
        &self.options
    }

    /// The process-wide cache of `Strict` leaves. Entries are never
    /// invalidated; [`StrictCache::clear`] drops them all.
    pub fn strict_cache(&self) -> &StrictCache {
        &self.strict
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("paths", &self.tree.len())
            .field("strict_entries", &self.strict.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn build_tree(mode: PolicyMode) -> Result<PolicyTree, fg_policy::PolicyError> {
    match mode {
        PolicyMode::Flat => PolicyTree::flat(),
        PolicyMode::RoleBased => PolicyTree::role_based(),
    }
}
