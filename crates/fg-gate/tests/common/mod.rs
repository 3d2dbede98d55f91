// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fg_core::{
    Caller, Category, CategoryId, Event, EventId, Invitation, InvitationId, Post, PostId, Role,
    User, UserId,
};
use fg_store::{Fixture, InMemoryStore, RecordStore, StoreError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Barrier;

pub fn user(role: Role, username: &str) -> User {
    User {
        id: UserId::generate(),
        role,
        username: username.into(),
        name: username.to_uppercase(),
        surname: "Test".into(),
        subscribes: Vec::new(),
    }
}

pub fn caller(u: &User) -> Option<Caller> {
    Some(Caller::new(u.id, u.role))
}

/// Owner, stranger, admin and requester around one public and one private
/// event.
pub struct Town {
    pub owner: User,
    pub stranger: User,
    pub admin: User,
    pub requester: User,
    pub public_event: Event,
    pub private_event: Event,
    pub post: Post,
}

impl Town {
    pub fn new() -> Self {
        let owner = user(Role::Free, "owner");
        let stranger = user(Role::Free, "stranger");
        let admin = user(Role::Administrator, "admin");
        let requester = user(Role::Free, "requester");
        let event = |title: &str, private: bool| Event {
            id: EventId::generate(),
            title: title.into(),
            time: Utc.with_ymd_and_hms(2024, 9, 1, 20, 0, 0).unwrap(),
            description: None,
            location: "hall".into(),
            owner: owner.id,
            private,
            managers: Vec::new(),
            categories: Vec::new(),
            attendants: vec![owner.id],
            requests: vec![requester.id],
        };
        let public_event = event("market", false);
        let private_event = event("party", true);
        let post = Post {
            id: PostId::generate(),
            content: "welcome".into(),
            flagged: false,
            locked: false,
            author: owner.id,
            posted_at: public_event.id,
        };
        Self {
            owner,
            stranger,
            admin,
            requester,
            public_event,
            private_event,
            post,
        }
    }

    pub fn fixture(&self) -> Fixture {
        Fixture {
            users: vec![
                self.owner.clone(),
                self.stranger.clone(),
                self.admin.clone(),
                self.requester.clone(),
            ],
            categories: Vec::new(),
            events: vec![self.public_event.clone(), self.private_event.clone()],
            invitations: Vec::new(),
            posts: vec![self.post.clone()],
        }
    }

    pub fn store(&self) -> Hooked {
        Hooked::new(InMemoryStore::from_fixture(self.fixture()), Hook::Pass)
    }
}

/// What event lookups do before (or instead of) reaching the records.
pub enum Hook {
    Pass,
    Fail,
    Stall,
    Rendezvous(Arc<Barrier>),
}

/// In-memory store whose event lookups can fail, stall or wait on a
/// barrier. Counts event lookups.
pub struct Hooked {
    inner: InMemoryStore,
    hook: Hook,
    pub event_lookups: AtomicUsize,
}

impl Hooked {
    pub fn new(inner: InMemoryStore, hook: Hook) -> Self {
        Self {
            inner,
            hook,
            event_lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_hook(self, hook: Hook) -> Self {
        Self { hook, ..self }
    }

    pub fn lookups(&self) -> usize {
        self.event_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for Hooked {
    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.inner.user(id).await
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        self.inner.category(id).await
    }

    async fn event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        self.event_lookups.fetch_add(1, Ordering::SeqCst);
        match &self.hook {
            Hook::Pass => {}
            Hook::Fail => {
                return Err(StoreError::Unavailable {
                    reason: "connection refused".into(),
                });
            }
            Hook::Stall => futures::future::pending::<()>().await,
            Hook::Rendezvous(barrier) => {
                barrier.wait().await;
            }
        }
        self.inner.event(id).await
    }

    async fn invitation(&self, id: InvitationId) -> Result<Option<Invitation>, StoreError> {
        self.inner.invitation(id).await
    }

    async fn post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        self.inner.post(id).await
    }

    async fn find_invitation(
        &self,
        event: EventId,
        invited: UserId,
    ) -> Result<Option<Invitation>, StoreError> {
        self.inner.find_invitation(event, invited).await
    }
}
