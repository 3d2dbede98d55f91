// SPDX-License-Identifier: MIT OR Apache-2.0
//! fieldgate
#![deny(unsafe_code)]
//!
//! Field-level authorization for typed object APIs. Every `(type, field)`
//! pair maps to a boolean rule over the caller, the call's arguments and
//! the already-resolved parent record; the gate evaluates that rule before
//! the field is resolved and withholds it on `false`.
//!
//! This crate re-exports the workspace members under short names.

pub use fg_config as config;
pub use fg_core as core;
pub use fg_error as error;
pub use fg_gate as gate;
pub use fg_policy as policy;
pub use fg_rule_engine as rule_engine;
pub use fg_store as store;
pub use fg_telemetry as telemetry;

pub use fg_core::{Args, Caller, Record, RequestContext, Role};
pub use fg_error::{ErrorCode, FgError};
pub use fg_gate::{AuthorizationGate, Decision, Denial, FieldOutcome, GateOptions, RequestScope};
pub use fg_policy::{Facts, PolicyError, PolicyTree};
pub use fg_rule_engine::{CachePolicy, Evaluation, Rule};
