// SPDX-License-Identifier: MIT OR Apache-2.0
//! fg-core
//!
//! Shared vocabulary of fieldgate: the records the API exposes, who is
//! asking ([`Caller`], [`RequestContext`]) and with which arguments
//! ([`Args`]).
#![deny(unsafe_code)]

pub mod args;
pub mod context;
pub mod ids;
pub mod records;

pub use args::Args;
pub use context::{AuthRequired, Caller, RequestContext};
pub use ids::{CategoryId, EventId, InvitationId, PostId, UserId};
pub use records::{Category, Event, Invitation, ParseRoleError, Post, Record, Role, User};

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Errors raised while producing canonical encodings.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Value could not be serialised to JSON.
    #[error("serialize: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialise `value` to JSON with deterministic key ordering.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, CoreError> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

/// Compute the hex-encoded SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
