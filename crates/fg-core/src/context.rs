// SPDX-License-Identifier: MIT OR Apache-2.0
//! Caller identity and the per-request context threaded through evaluation.

use crate::ids::UserId;
use crate::records::Role;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated identity making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Caller {
    pub id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

/// Immutable per-request context.
///
/// Built once by the session layer when a request arrives and passed
/// explicitly into every evaluation. `caller == None` means "not logged in".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub caller: Option<Caller>,
}

impl RequestContext {
    /// Context for an anonymous request.
    pub fn anonymous() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            caller: None,
        }
    }

    /// Context for an authenticated request.
    pub fn authenticated(caller: Caller) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            caller: Some(caller),
        }
    }

    /// Context for an optional caller.
    pub fn for_caller(caller: Option<Caller>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            caller,
        }
    }

    pub fn caller(&self) -> Option<&Caller> {
        self.caller.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.caller.is_some()
    }

    /// The caller, or [`AuthRequired`] for anonymous requests.
    pub fn require_caller(&self) -> Result<&Caller, AuthRequired> {
        self.caller.as_ref().ok_or(AuthRequired)
    }
}

/// Returned when a check needs a caller identity but the request has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("must be logged in")]
pub struct AuthRequired;
