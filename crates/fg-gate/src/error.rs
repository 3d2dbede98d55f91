// SPDX-License-Identifier: MIT OR Apache-2.0
//! Gate failures and their mapping onto [`FgError`].

use fg_error::{ErrorCode, FgError};
use fg_policy::PolicyError;
use fg_rule_engine::EvalError;

/// Why the gate could not produce a decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The policy tree could not be built.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// A predicate's record lookup failed in transport.
    #[error(transparent)]
    Lookup(#[from] EvalError),
    /// The request's deadline passed while a check was in flight.
    #[error("request deadline passed while checking {site}")]
    TimedOut {
        /// `Type.field` being checked.
        site: String,
    },
}

impl From<GateError> for FgError {
    fn from(err: GateError) -> Self {
        match &err {
            GateError::Policy(PolicyError::Shape(shape)) => {
                let path = shape.path.clone();
                FgError::new(ErrorCode::PolicyShapeMismatch, err.to_string())
                    .with_context("path", path)
                    .with_source(err)
            }
            GateError::Policy(PolicyError::Malformed { path, .. }) => {
                let path = path.clone();
                FgError::new(ErrorCode::PolicyMalformed, err.to_string())
                    .with_context("path", path)
                    .with_source(err)
            }
            GateError::Lookup(EvalError::Predicate {
                predicate, site, ..
            }) => {
                let (predicate, site) = (predicate.clone(), site.clone());
                FgError::new(ErrorCode::PredicateLookupFailed, err.to_string())
                    .with_context("predicate", predicate)
                    .with_context("site", site)
                    .with_source(err)
            }
            GateError::TimedOut { site } => {
                let site = site.clone();
                FgError::new(ErrorCode::RequestTimedOut, err.to_string()).with_context("site", site)
            }
        }
    }
}
