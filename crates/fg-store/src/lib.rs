// SPDX-License-Identifier: MIT OR Apache-2.0
//! Record lookups consulted by fieldgate predicates.
//!
//! The persistence layer is an external collaborator; predicates only need
//! to fetch a handful of records by id. [`RecordStore`] is that seam.
//! `Ok(None)` means "no such record" and is a normal answer, whereas
//! [`StoreError`] is a transport fault that fails the whole request.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod fixture;
mod memory;

pub use fixture::{Fixture, FixtureError};
pub use memory::InMemoryStore;

use async_trait::async_trait;
use fg_core::{
    Category, CategoryId, Event, EventId, Invitation, InvitationId, Post, PostId, User, UserId,
};

/// Transport-level lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("record store unavailable: {reason}")]
    Unavailable {
        /// Human-readable detail.
        reason: String,
    },
    /// The lookup did not finish in time.
    #[error("record lookup timed out")]
    TimedOut,
}

/// Read-only record lookups by id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a user.
    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Fetch a category.
    async fn category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    /// Fetch an event.
    async fn event(&self, id: EventId) -> Result<Option<Event>, StoreError>;

    /// Fetch an invitation.
    async fn invitation(&self, id: InvitationId) -> Result<Option<Invitation>, StoreError>;

    /// Fetch a post.
    async fn post(&self, id: PostId) -> Result<Option<Post>, StoreError>;

    /// Find the invitation of `invited` to `event`, if any.
    async fn find_invitation(
        &self,
        event: EventId,
        invited: UserId,
    ) -> Result<Option<Invitation>, StoreError>;
}
