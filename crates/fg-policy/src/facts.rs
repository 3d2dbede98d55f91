// SPDX-License-Identifier: MIT OR Apache-2.0
//! What a predicate may look at when deciding one field.

use fg_core::{Args, Caller, Record, RequestContext, canonical_json, sha256_hex};
use fg_rule_engine::{Fingerprint, PredicateError};
use fg_store::RecordStore;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// The evaluation input of every fieldgate rule: request context, call
/// arguments, the already-resolved parent record and a handle to the store.
#[derive(Clone)]
pub struct Facts {
    /// Immutable per-request context.
    pub ctx: Arc<RequestContext>,
    /// Arguments of the field or operation.
    pub args: Arc<Args>,
    /// The record whose field is being resolved; `None` for root operations.
    pub parent: Option<Arc<Record>>,
    /// Record lookups.
    pub store: Arc<dyn RecordStore>,
}

impl Facts {
    /// Bundle the inputs of one check.
    pub fn new(
        ctx: Arc<RequestContext>,
        args: Arc<Args>,
        parent: Option<Arc<Record>>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            ctx,
            args,
            parent,
            store,
        }
    }

    /// The caller, if logged in.
    pub fn caller(&self) -> Option<&Caller> {
        self.ctx.caller()
    }

    /// The caller, or [`PredicateError::Unauthenticated`].
    pub fn require_caller(&self) -> Result<&Caller, PredicateError> {
        self.ctx
            .require_caller()
            .map_err(|_| PredicateError::Unauthenticated)
    }

    /// The parent record, if any.
    pub fn parent(&self) -> Option<&Record> {
        self.parent.as_deref()
    }
}

impl fmt::Debug for Facts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facts")
            .field("ctx", &self.ctx)
            .field("args", &self.args)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Digestible<'a> {
    caller: Option<&'a Caller>,
    args: &'a Args,
    parent: Option<&'a Record>,
}

impl Fingerprint for Facts {
    /// SHA-256 over the canonical JSON of caller, arguments and parent.
    /// The request id is not part of the digest.
    fn fingerprint(&self) -> Option<String> {
        let digestible = Digestible {
            caller: self.caller(),
            args: &self.args,
            parent: self.parent(),
        };
        canonical_json(&digestible)
            .ok()
            .map(|json| sha256_hex(json.as_bytes()))
    }
}
