// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use fg_core::{
    Args, Caller, Category, CategoryId, Event, EventId, Invitation, InvitationId, Post, PostId,
    Record, RequestContext, Role, User, UserId,
};
use fg_policy::{Facts, PolicyTree};
use fg_rule_engine::{Evaluation, Evaluator, RequestCache, Rule};
use fg_store::{Fixture, InMemoryStore};
use std::sync::Arc;

/// A small social graph touching every predicate.
pub struct World {
    pub store: Arc<InMemoryStore>,
    pub admin: User,
    pub moderator: User,
    pub premium: User,
    pub owner: User,
    pub manager: User,
    pub attendee: User,
    pub invitee: User,
    pub requester: User,
    pub stranger: User,
    pub music: Category,
    pub public_event: Event,
    pub private_event: Event,
    pub invitation: Invitation,
    pub open_post: Post,
    pub locked_post: Post,
}

fn user(role: Role, username: &str) -> User {
    User {
        id: UserId::generate(),
        role,
        username: username.into(),
        name: username.to_uppercase(),
        surname: "Test".into(),
        subscribes: Vec::new(),
    }
}

impl World {
    pub fn new() -> Self {
        let admin = user(Role::Administrator, "admin");
        let moderator = user(Role::Moderator, "moderator");
        let premium = user(Role::Premium, "premium");
        let owner = user(Role::Free, "owner");
        let manager = user(Role::Free, "manager");
        let attendee = user(Role::Free, "attendee");
        let invitee = user(Role::Free, "invitee");
        let requester = user(Role::Free, "requester");
        let stranger = user(Role::Free, "stranger");

        let music = Category {
            id: CategoryId::generate(),
            name: "music".into(),
            moderators: vec![moderator.id],
        };
        let public_event = Event {
            id: EventId::generate(),
            title: "open air".into(),
            time: Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap(),
            description: Some("bring a blanket".into()),
            location: "park".into(),
            owner: owner.id,
            private: false,
            managers: vec![manager.id],
            categories: vec![music.id],
            attendants: vec![owner.id, attendee.id],
            requests: vec![requester.id],
        };
        let private_event = Event {
            id: EventId::generate(),
            title: "dinner".into(),
            time: Utc.with_ymd_and_hms(2024, 6, 2, 19, 0, 0).unwrap(),
            description: None,
            location: "home".into(),
            owner: premium.id,
            private: true,
            managers: Vec::new(),
            categories: Vec::new(),
            attendants: vec![premium.id],
            requests: Vec::new(),
        };
        let invitation = Invitation {
            id: InvitationId::generate(),
            from: premium.id,
            invited: invitee.id,
            to: private_event.id,
        };
        let open_post = Post {
            id: PostId::generate(),
            content: "see you there".into(),
            flagged: false,
            locked: false,
            author: attendee.id,
            posted_at: public_event.id,
        };
        let locked_post = Post {
            id: PostId::generate(),
            content: "spam".into(),
            flagged: true,
            locked: true,
            author: attendee.id,
            posted_at: public_event.id,
        };

        let fixture = Fixture {
            users: vec![
                admin.clone(),
                moderator.clone(),
                premium.clone(),
                owner.clone(),
                manager.clone(),
                attendee.clone(),
                invitee.clone(),
                requester.clone(),
                stranger.clone(),
            ],
            categories: vec![music.clone()],
            events: vec![public_event.clone(), private_event.clone()],
            invitations: vec![invitation.clone()],
            posts: vec![open_post.clone(), locked_post.clone()],
        };

        Self {
            store: Arc::new(InMemoryStore::from_fixture(fixture)),
            admin,
            moderator,
            premium,
            owner,
            manager,
            attendee,
            invitee,
            requester,
            stranger,
            music,
            public_event,
            private_event,
            invitation,
            open_post,
            locked_post,
        }
    }

    pub fn users(&self) -> Vec<&User> {
        vec![
            &self.admin,
            &self.moderator,
            &self.premium,
            &self.owner,
            &self.manager,
            &self.attendee,
            &self.invitee,
            &self.requester,
            &self.stranger,
        ]
    }

    /// Every user plus the anonymous caller.
    pub fn callers(&self) -> Vec<Option<Caller>> {
        let mut out: Vec<Option<Caller>> = self
            .users()
            .into_iter()
            .map(|u| Some(Caller::new(u.id, u.role)))
            .collect();
        out.push(None);
        out
    }

    /// Every record of schema type `ty`.
    pub fn records_of(&self, ty: &str) -> Vec<Record> {
        match ty {
            "User" => self.users().into_iter().cloned().map(Record::from).collect(),
            "Category" => vec![self.music.clone().into()],
            "Event" => vec![
                self.public_event.clone().into(),
                self.private_event.clone().into(),
            ],
            "Invitation" => vec![self.invitation.clone().into()],
            "Post" => vec![self.open_post.clone().into(), self.locked_post.clone().into()],
            _ => Vec::new(),
        }
    }

    /// Argument bags covering every shape the mutations accept.
    pub fn arg_variants(&self) -> Vec<Args> {
        let mut out = vec![Args::new()];
        for event in [&self.public_event, &self.private_event] {
            for u in self.users() {
                out.push(
                    Args::new()
                        .with("event", event.id.to_string())
                        .with("user", u.id.to_string()),
                );
            }
            out.push(Args::new().with(
                "event",
                serde_json::json!({ "_id": event.id.to_string(), "private": event.private }),
            ));
        }
        out.push(Args::new().with(
            "event",
            serde_json::json!({ "title": "new", "private": true }),
        ));
        out.push(Args::new().with("invitation", self.invitation.id.to_string()));
        for post in [&self.open_post, &self.locked_post] {
            out.push(Args::new().with("post", post.id.to_string()));
        }
        out.push(Args::new().with(
            "post",
            serde_json::json!({ "postedAt": self.public_event.id.to_string(), "content": "hi" }),
        ));
        out.push(Args::new().with("category", self.music.id.to_string()));
        for u in self.users() {
            out.push(Args::new().with("user", u.id.to_string()));
        }
        out
    }

    pub fn facts(&self, caller: Option<&User>, args: Args, parent: Option<Record>) -> Facts {
        self.facts_for(caller.map(|u| Caller::new(u.id, u.role)), args, parent)
    }

    pub fn facts_for(&self, caller: Option<Caller>, args: Args, parent: Option<Record>) -> Facts {
        Facts::new(
            Arc::new(RequestContext::for_caller(caller)),
            Arc::new(args),
            parent.map(Arc::new),
            self.store.clone(),
        )
    }
}

/// Evaluate `rule` in a fresh request.
pub async fn eval(rule: &Rule<Facts>, facts: &Facts) -> Evaluation {
    let cache = RequestCache::new();
    Evaluator::new(&cache)
        .evaluate(rule, "Test.site", facts)
        .await
        .expect("in-memory lookups do not fail")
}

/// Decide `ty.field` under `tree` in a fresh request.
pub async fn decide(tree: &PolicyTree, ty: &str, field: &str, facts: &Facts) -> bool {
    let cache = RequestCache::new();
    Evaluator::new(&cache)
        .evaluate(tree.lookup(ty, field), &format!("{ty}.{field}"), facts)
        .await
        .expect("in-memory lookups do not fail")
        .allowed
}
