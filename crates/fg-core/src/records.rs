// SPDX-License-Identifier: MIT OR Apache-2.0
//! Records of the social/event domain.
//!
//! These mirror what the persistence layer hands to field resolvers. The
//! authorization engine only reads them: as the already-resolved parent of a
//! field, or as the result of a predicate lookup.

use crate::ids::{CategoryId, EventId, InvitationId, PostId, UserId};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access level of an authenticated caller.
///
/// Variants are declared in rank order, so `Role::Free < Role::Administrator`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Default role of every new account.
    Free,
    /// Paying member; may create private events and subscribe to categories.
    Premium,
    /// Moderates one or more categories.
    Moderator,
    /// Full administrative access.
    Administrator,
}

impl Role {
    /// All roles in rank order.
    pub const ALL: [Role; 4] = [
        Role::Free,
        Role::Premium,
        Role::Moderator,
        Role::Administrator,
    ];

    /// Stable upper-case name (`"FREE"`, `"ADMINISTRATOR"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Free => "FREE",
            Role::Premium => "PREMIUM",
            Role::Moderator => "MODERATOR",
            Role::Administrator => "ADMINISTRATOR",
        }
    }

    /// Every role ranked at or below this one.
    pub fn and_below(self) -> impl Iterator<Item = Role> {
        Role::ALL.into_iter().filter(move |r| *r <= self)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role name that matches none of [`Role::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct ParseRoleError(pub String);

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct User {
    pub id: UserId,
    pub role: Role,
    pub username: String,
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub subscribes: Vec<CategoryId>,
}

/// A topic that events can be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub moderators: Vec<UserId>,
}

/// A scheduled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub location: String,
    pub owner: UserId,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub managers: Vec<UserId>,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default)]
    pub attendants: Vec<UserId>,
    #[serde(default)]
    pub requests: Vec<UserId>,
}

impl Event {
    /// Owner or one of the managers.
    pub fn is_managed_by(&self, user: UserId) -> bool {
        self.owner == user || self.managers.contains(&user)
    }
}

/// An invitation of one user to an event, sent by another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Invitation {
    pub id: InvitationId,
    pub from: UserId,
    pub invited: UserId,
    pub to: EventId,
}

/// A message on an event's board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Post {
    pub id: PostId,
    pub content: String,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub locked: bool,
    pub author: UserId,
    pub posted_at: EventId,
}

/// Any record that can be the resolved parent of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    User(User),
    Category(Category),
    Event(Event),
    Invitation(Invitation),
    Post(Post),
}

impl Record {
    /// Schema type name of this record (`"Event"`, `"Post"`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            Record::User(_) => "User",
            Record::Category(_) => "Category",
            Record::Event(_) => "Event",
            Record::Invitation(_) => "Invitation",
            Record::Post(_) => "Post",
        }
    }

    /// Raw id of the record.
    pub fn id(&self) -> Uuid {
        match self {
            Record::User(u) => u.id.into_inner(),
            Record::Category(c) => c.id.into_inner(),
            Record::Event(e) => e.id.into_inner(),
            Record::Invitation(i) => i.id.into_inner(),
            Record::Post(p) => p.id.into_inner(),
        }
    }

    /// Read a user reference (or list of references) by field name.
    ///
    /// Field names follow the schema (`owner`, `managers`, `invited`, ...).
    /// Returns an empty list when the field does not exist on this record.
    pub fn user_refs(&self, field: &str) -> Vec<UserId> {
        match (self, field) {
            (Record::User(u), "_id") => vec![u.id],
            (Record::Category(c), "moderators") => c.moderators.clone(),
            (Record::Event(e), "owner") => vec![e.owner],
            (Record::Event(e), "managers") => e.managers.clone(),
            (Record::Event(e), "attendants") => e.attendants.clone(),
            (Record::Event(e), "requests") => e.requests.clone(),
            (Record::Invitation(i), "from") => vec![i.from],
            (Record::Invitation(i), "invited") => vec![i.invited],
            (Record::Post(p), "author") => vec![p.author],
            _ => Vec::new(),
        }
    }
}

impl From<User> for Record {
    fn from(v: User) -> Self {
        Record::User(v)
    }
}

impl From<Category> for Record {
    fn from(v: Category) -> Self {
        Record::Category(v)
    }
}

impl From<Event> for Record {
    fn from(v: Event) -> Self {
        Record::Event(v)
    }
}

impl From<Invitation> for Record {
    fn from(v: Invitation) -> Self {
        Record::Invitation(v)
    }
}

impl From<Post> for Record {
    fn from(v: Post) -> Self {
        Record::Post(v)
    }
}
