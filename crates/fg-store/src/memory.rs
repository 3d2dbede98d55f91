// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-process [`RecordStore`] backed by hash maps.

use crate::fixture::Fixture;
use crate::{RecordStore, StoreError};
use async_trait::async_trait;
use fg_core::{
    Category, CategoryId, Event, EventId, Invitation, InvitationId, Post, PostId, User, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    categories: HashMap<CategoryId, Category>,
    events: HashMap<EventId, Event>,
    invitations: HashMap<InvitationId, Invitation>,
    posts: HashMap<PostId, Post>,
}

/// Thread-safe in-memory record store.
///
/// Cloning is cheap and yields a handle to the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding every record of `fixture`.
    pub fn from_fixture(fixture: Fixture) -> Self {
        let tables = Tables {
            users: fixture.users.into_iter().map(|r| (r.id, r)).collect(),
            categories: fixture.categories.into_iter().map(|r| (r.id, r)).collect(),
            events: fixture.events.into_iter().map(|r| (r.id, r)).collect(),
            invitations: fixture.invitations.into_iter().map(|r| (r.id, r)).collect(),
            posts: fixture.posts.into_iter().map(|r| (r.id, r)).collect(),
        };
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// Insert or replace a user.
    pub async fn put_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    /// Insert or replace a category.
    pub async fn put_category(&self, category: Category) {
        self.tables
            .write()
            .await
            .categories
            .insert(category.id, category);
    }

    /// Insert or replace an event.
    pub async fn put_event(&self, event: Event) {
        self.tables.write().await.events.insert(event.id, event);
    }

    /// Insert or replace an invitation.
    pub async fn put_invitation(&self, invitation: Invitation) {
        self.tables
            .write()
            .await
            .invitations
            .insert(invitation.id, invitation);
    }

    /// Insert or replace a post.
    pub async fn put_post(&self, post: Post) {
        self.tables.write().await.posts.insert(post.id, post);
    }

    /// Remove an event. Returns the removed record, if any.
    pub async fn remove_event(&self, id: EventId) -> Option<Event> {
        self.tables.write().await.events.remove(&id)
    }

    /// Copy the current contents out as a [`Fixture`] (sorted by id).
    pub async fn snapshot(&self) -> Fixture {
        let t = self.tables.read().await;
        let mut fx = Fixture {
            users: t.users.values().cloned().collect(),
            categories: t.categories.values().cloned().collect(),
            events: t.events.values().cloned().collect(),
            invitations: t.invitations.values().cloned().collect(),
            posts: t.posts.values().cloned().collect(),
        };
        fx.users.sort_by_key(|r| r.id);
        fx.categories.sort_by_key(|r| r.id);
        fx.events.sort_by_key(|r| r.id);
        fx.invitations.sort_by_key(|r| r.id);
        fx.posts.sort_by_key(|r| r.id);
        fx
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn invitation(&self, id: InvitationId) -> Result<Option<Invitation>, StoreError> {
        Ok(self.tables.read().await.invitations.get(&id).cloned())
    }

    async fn post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn find_invitation(
        &self,
        event: EventId,
        invited: UserId,
    ) -> Result<Option<Invitation>, StoreError> {
        let t = self.tables.read().await;
        let found = t
            .invitations
            .values()
            .find(|i| i.to == event && i.invited == invited)
            .cloned();
        debug!(%event, %invited, found = found.is_some(), "find_invitation");
        Ok(found)
    }
}
