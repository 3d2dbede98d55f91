// SPDX-License-Identifier: MIT OR Apache-2.0
//! The predicate library.
//!
//! Every check treats a missing record as `false`. Only transport failures
//! of the [`RecordStore`](fg_store::RecordStore) surface as errors. Checks
//! that compare against the caller report
//! [`PredicateError::Unauthenticated`] for anonymous requests before doing
//! any lookup.

use crate::facts::Facts;
use async_trait::async_trait;
use fg_core::{
    CategoryId, Event, EventId, InvitationId, PostId, Record, Role, UserId,
};
use fg_rule_engine::{CachePolicy, Predicate, PredicateError, Rule};
use fg_store::StoreError;
use std::fmt;

/// Which user a [`Check::IsCaller`] compares against the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    /// The user named by the `user` argument.
    Arg,
    /// The parent record, when it is a user.
    Parent,
    /// A user reference (or list of them) held by the parent record.
    Property(&'static str),
}

/// A named check over [`Facts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    /// A caller identity is present.
    IsLoggedIn,
    /// The caller holds exactly this role.
    CallerHasRole(Role),
    /// The user named by the `user` argument holds this role.
    ArgHasRole(Role),
    /// The referenced user is the caller.
    IsCaller(Reference),
    /// The parent event is private.
    ParentIsPrivate,
    /// The event argument (stored or given as input) is private.
    ArgIsPrivate,
    /// The caller owns the event the arguments point at.
    CallerOwnsArg,
    /// The caller owns the parent event (or the invitation's event).
    CallerOwnsParent,
    /// The caller owns or manages the event the arguments point at.
    CallerManagesArg,
    /// The caller owns or manages the parent's event.
    CallerManagesParent,
    /// The caller is invited to the event, or is the invitee of the
    /// invitation, named by the arguments.
    CallerIsInvitedToArg,
    /// Same as [`Check::CallerIsInvitedToArg`] for the parent record.
    CallerIsInvitedToParent,
    /// The caller has a pending request for the event argument.
    CallerRequestsArg,
    /// The user argument has a pending request for the event argument.
    ArgRequestsArg,
    /// The caller attends the event the arguments point at.
    CallerAttendsArg,
    /// The caller attends the parent's event.
    CallerAttendsParent,
    /// The caller moderates the category argument, or a category of the
    /// event the arguments point at.
    CallerModeratesArg,
    /// The caller moderates the parent category or a category of the
    /// parent's event.
    CallerModeratesParent,
    /// The post argument is flagged.
    ArgIsFlagged,
    /// The post argument is locked.
    ArgIsLocked,
    /// The parent post is locked.
    ParentIsLocked,
    /// The stored event named by the event input has an owner.
    ArgEventHasOwner,
    /// The event input sets an owner.
    ArgOwnerDefined,
}

impl Check {
    /// Caching discipline used when this check becomes a rule leaf.
    ///
    /// Identity checks are stable for one request. The two strict checks
    /// read state that can change between requests; their staleness is
    /// accepted.
    pub fn cache_policy(&self) -> CachePolicy {
        match self {
            Self::IsLoggedIn | Self::CallerHasRole(_) => CachePolicy::PerRequest,
            Self::ArgRequestsArg | Self::ArgEventHasOwner => CachePolicy::Strict,
            _ => CachePolicy::None,
        }
    }

    /// Leaf rule running this check.
    pub fn rule(self) -> Rule<Facts> {
        Rule::leaf(
            LibraryPredicate {
                check: self,
                name: self.to_string(),
            },
            self.cache_policy(),
        )
    }

    /// Run the check.
    pub async fn test(&self, facts: &Facts) -> Result<bool, PredicateError> {
        match *self {
            Self::IsLoggedIn => facts.require_caller().map(|_| true),
            Self::CallerHasRole(role) => Ok(facts.require_caller()?.has_role(role)),
            Self::ArgHasRole(role) => {
                let user = match facts.args.id::<UserId>("user") {
                    Some(id) => facts.store.user(id).await.map_err(lookup)?,
                    None => None,
                };
                Ok(user.is_some_and(|u| u.role == role))
            }
            Self::IsCaller(reference) => {
                let me = facts.require_caller()?.id;
                Ok(match reference {
                    Reference::Arg => facts.args.id::<UserId>("user") == Some(me),
                    Reference::Parent => {
                        matches!(facts.parent(), Some(Record::User(u)) if u.id == me)
                    }
                    Reference::Property(field) => facts
                        .parent()
                        .is_some_and(|p| p.user_refs(field).contains(&me)),
                })
            }
            Self::ParentIsPrivate => Ok(matches!(facts.parent(), Some(Record::Event(e)) if e.private)),
            Self::ArgIsPrivate => {
                if let Some(private) = facts.args.flag("event", "private") {
                    return Ok(private);
                }
                if facts.args.object("event").is_some() {
                    return Ok(false);
                }
                let event = load_event(facts, facts.args.id("event")).await?;
                Ok(event.is_some_and(|e| e.private))
            }
            Self::CallerOwnsArg => {
                let me = facts.require_caller()?.id;
                let event = load_event(facts, event_pointer(facts).await?).await?;
                Ok(event.is_some_and(|e| e.owner == me))
            }
            Self::CallerOwnsParent => {
                let me = facts.require_caller()?.id;
                let event = parent_event(facts).await?;
                Ok(event.is_some_and(|e| e.owner == me))
            }
            Self::CallerManagesArg => {
                let me = facts.require_caller()?.id;
                let event = load_event(facts, event_pointer(facts).await?).await?;
                Ok(event.is_some_and(|e| e.is_managed_by(me)))
            }
            Self::CallerManagesParent => {
                let me = facts.require_caller()?.id;
                let event = parent_event(facts).await?;
                Ok(event.is_some_and(|e| e.is_managed_by(me)))
            }
            Self::CallerIsInvitedToArg => {
                let me = facts.require_caller()?.id;
                if facts.args.contains("event") {
                    return invited_to_event(facts, facts.args.id("event"), me).await;
                }
                let invitation = match facts.args.id::<InvitationId>("invitation") {
                    Some(id) => facts.store.invitation(id).await.map_err(lookup)?,
                    None => None,
                };
                Ok(invitation.is_some_and(|i| i.invited == me))
            }
            Self::CallerIsInvitedToParent => {
                let me = facts.require_caller()?.id;
                match facts.parent() {
                    Some(Record::Event(e)) => invited_to_event(facts, Some(e.id), me).await,
                    Some(Record::Invitation(i)) => Ok(i.invited == me),
                    _ => Ok(false),
                }
            }
            Self::CallerRequestsArg => {
                let me = facts.require_caller()?.id;
                let event = load_event(facts, facts.args.id("event")).await?;
                Ok(event.is_some_and(|e| e.requests.contains(&me)))
            }
            Self::ArgRequestsArg => {
                let Some(user) = facts.args.id::<UserId>("user") else {
                    return Ok(false);
                };
                let event = load_event(facts, facts.args.id("event")).await?;
                Ok(event.is_some_and(|e| e.requests.contains(&user)))
            }
            Self::CallerAttendsArg => {
                let me = facts.require_caller()?.id;
                let id = match facts.args.nested_id::<EventId>("post", "postedAt") {
                    Some(id) => Some(id),
                    None => event_pointer(facts).await?,
                };
                let event = load_event(facts, id).await?;
                Ok(event.is_some_and(|e| e.attendants.contains(&me)))
            }
            Self::CallerAttendsParent => {
                let me = facts.require_caller()?.id;
                let event = match facts.parent() {
                    Some(Record::Event(_)) | Some(Record::Post(_)) => parent_event(facts).await?,
                    _ => None,
                };
                Ok(event.is_some_and(|e| e.attendants.contains(&me)))
            }
            Self::CallerModeratesArg => {
                let me = facts.require_caller()?.id;
                if let Some(category) = facts.args.id::<CategoryId>("category") {
                    return moderates_any(facts, &[category], me).await;
                }
                match load_event(facts, event_pointer(facts).await?).await? {
                    Some(e) => moderates_any(facts, &e.categories, me).await,
                    None => Ok(false),
                }
            }
            Self::CallerModeratesParent => {
                let me = facts.require_caller()?.id;
                if let Some(Record::Category(c)) = facts.parent() {
                    return Ok(c.moderators.contains(&me));
                }
                match parent_event(facts).await? {
                    Some(e) => moderates_any(facts, &e.categories, me).await,
                    None => Ok(false),
                }
            }
            Self::ArgIsFlagged => Ok(post_arg(facts).await?.is_some_and(|p| p.flagged)),
            Self::ArgIsLocked => Ok(post_arg(facts).await?.is_some_and(|p| p.locked)),
            Self::ParentIsLocked => Ok(matches!(facts.parent(), Some(Record::Post(p)) if p.locked)),
            Self::ArgEventHasOwner => {
                Ok(load_event(facts, facts.args.id("event")).await?.is_some())
            }
            Self::ArgOwnerDefined => Ok(facts.args.has_field("event", "owner")),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IsLoggedIn => "is_logged_in",
            Self::CallerHasRole(role) => return write!(f, "caller_has_role({role})"),
            Self::ArgHasRole(role) => return write!(f, "arg_has_role({role})"),
            Self::IsCaller(Reference::Arg) => "is_caller(arg)",
            Self::IsCaller(Reference::Parent) => "is_caller(parent)",
            Self::IsCaller(Reference::Property(p)) => {
                return write!(f, "is_caller(parent.{p})");
            }
            Self::ParentIsPrivate => "parent_is_private",
            Self::ArgIsPrivate => "arg_is_private",
            Self::CallerOwnsArg => "caller_owns_arg",
            Self::CallerOwnsParent => "caller_owns_parent",
            Self::CallerManagesArg => "caller_manages_arg",
            Self::CallerManagesParent => "caller_manages_parent",
            Self::CallerIsInvitedToArg => "caller_is_invited_to_arg",
            Self::CallerIsInvitedToParent => "caller_is_invited_to_parent",
            Self::CallerRequestsArg => "caller_requests_arg",
            Self::ArgRequestsArg => "arg_requests_arg",
            Self::CallerAttendsArg => "caller_attends_arg",
            Self::CallerAttendsParent => "caller_attends_parent",
            Self::CallerModeratesArg => "caller_moderates_arg",
            Self::CallerModeratesParent => "caller_moderates_parent",
            Self::ArgIsFlagged => "arg_is_flagged",
            Self::ArgIsLocked => "arg_is_locked",
            Self::ParentIsLocked => "parent_is_locked",
            Self::ArgEventHasOwner => "arg_event_has_owner",
            Self::ArgOwnerDefined => "arg_owner_defined",
        };
        f.write_str(name)
    }
}

struct LibraryPredicate {
    check: Check,
    name: String,
}

#[async_trait]
impl Predicate<Facts> for LibraryPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    async fn test(&self, facts: &Facts) -> Result<bool, PredicateError> {
        self.check.test(facts).await
    }
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

fn lookup(err: StoreError) -> PredicateError {
    PredicateError::Lookup(err.to_string())
}

async fn load_event(facts: &Facts, id: Option<EventId>) -> Result<Option<Event>, PredicateError> {
    match id {
        Some(id) => facts.store.event(id).await.map_err(lookup),
        None => Ok(None),
    }
}

/// Event named by the arguments: `event` directly, or through the target of
/// `invitation`, or the board of `post`.
async fn event_pointer(facts: &Facts) -> Result<Option<EventId>, PredicateError> {
    let args = &facts.args;
    if args.contains("event") {
        return Ok(args.id("event"));
    }
    if let Some(id) = args.id::<InvitationId>("invitation") {
        let invitation = facts.store.invitation(id).await.map_err(lookup)?;
        return Ok(invitation.map(|i| i.to));
    }
    if let Some(id) = args.id::<PostId>("post") {
        let post = facts.store.post(id).await.map_err(lookup)?;
        return Ok(post.map(|p| p.posted_at));
    }
    Ok(None)
}

/// The parent event itself, or the event an invitation or post belongs to.
async fn parent_event(facts: &Facts) -> Result<Option<Event>, PredicateError> {
    let id = match facts.parent() {
        Some(Record::Event(e)) => return Ok(Some(e.clone())),
        Some(Record::Invitation(i)) => i.to,
        Some(Record::Post(p)) => p.posted_at,
        _ => return Ok(None),
    };
    load_event(facts, Some(id)).await
}

async fn invited_to_event(
    facts: &Facts,
    event: Option<EventId>,
    me: UserId,
) -> Result<bool, PredicateError> {
    let Some(event) = event else {
        return Ok(false);
    };
    let found = facts
        .store
        .find_invitation(event, me)
        .await
        .map_err(lookup)?;
    Ok(found.is_some())
}

async fn moderates_any(
    facts: &Facts,
    categories: &[CategoryId],
    me: UserId,
) -> Result<bool, PredicateError> {
    for id in categories {
        let category = facts.store.category(*id).await.map_err(lookup)?;
        if category.is_some_and(|c| c.moderators.contains(&me)) {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn post_arg(facts: &Facts) -> Result<Option<fg_core::Post>, PredicateError> {
    match facts.args.id::<PostId>("post") {
        Some(id) => facts.store.post(id).await.map_err(lookup),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Rule constructors
// ---------------------------------------------------------------------------

/// See [`Check::IsLoggedIn`].
pub fn is_logged_in() -> Rule<Facts> {
    Check::IsLoggedIn.rule()
}

/// See [`Check::CallerHasRole`].
pub fn caller_has_role(role: Role) -> Rule<Facts> {
    Check::CallerHasRole(role).rule()
}

/// See [`Check::ArgHasRole`].
pub fn arg_has_role(role: Role) -> Rule<Facts> {
    Check::ArgHasRole(role).rule()
}

/// See [`Check::IsCaller`].
pub fn is_caller(reference: Reference) -> Rule<Facts> {
    Check::IsCaller(reference).rule()
}

pub fn parent_is_private() -> Rule<Facts> {
    Check::ParentIsPrivate.rule()
}

pub fn arg_is_private() -> Rule<Facts> {
    Check::ArgIsPrivate.rule()
}

pub fn caller_owns_arg() -> Rule<Facts> {
    Check::CallerOwnsArg.rule()
}

pub fn caller_owns_parent() -> Rule<Facts> {
    Check::CallerOwnsParent.rule()
}

pub fn caller_manages_arg() -> Rule<Facts> {
    Check::CallerManagesArg.rule()
}

pub fn caller_manages_parent() -> Rule<Facts> {
    Check::CallerManagesParent.rule()
}

pub fn caller_is_invited_to_arg() -> Rule<Facts> {
    Check::CallerIsInvitedToArg.rule()
}

pub fn caller_is_invited_to_parent() -> Rule<Facts> {
    Check::CallerIsInvitedToParent.rule()
}

pub fn caller_requests_arg() -> Rule<Facts> {
    Check::CallerRequestsArg.rule()
}

pub fn arg_requests_arg() -> Rule<Facts> {
    Check::ArgRequestsArg.rule()
}

pub fn caller_attends_arg() -> Rule<Facts> {
    Check::CallerAttendsArg.rule()
}

pub fn caller_attends_parent() -> Rule<Facts> {
    Check::CallerAttendsParent.rule()
}

pub fn caller_moderates_arg() -> Rule<Facts> {
    Check::CallerModeratesArg.rule()
}

pub fn caller_moderates_parent() -> Rule<Facts> {
    Check::CallerModeratesParent.rule()
}

pub fn arg_is_flagged() -> Rule<Facts> {
    Check::ArgIsFlagged.rule()
}

pub fn arg_is_locked() -> Rule<Facts> {
    Check::ArgIsLocked.rule()
}

pub fn parent_is_locked() -> Rule<Facts> {
    Check::ParentIsLocked.rule()
}

pub fn arg_event_has_owner() -> Rule<Facts> {
    Check::ArgEventHasOwner.rule()
}

pub fn arg_owner_defined() -> Rule<Facts> {
    Check::ArgOwnerDefined.rule()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_caller_facts_are_cached_per_request() {
        assert_eq!(Check::IsLoggedIn.cache_policy(), CachePolicy::PerRequest);
        assert_eq!(
            Check::CallerHasRole(Role::Moderator).cache_policy(),
            CachePolicy::PerRequest
        );
        // Relationship checks read the parent or the arguments, which differ
        // between checks at one site.
        for check in [
            Check::IsCaller(Reference::Parent),
            Check::ParentIsPrivate,
            Check::CallerOwnsParent,
            Check::CallerManagesArg,
            Check::CallerIsInvitedToParent,
            Check::CallerRequestsArg,
        ] {
            assert_eq!(check.cache_policy(), CachePolicy::None, "{check:?}");
        }
        assert_eq!(Check::ArgRequestsArg.cache_policy(), CachePolicy::Strict);
        assert_eq!(Check::ArgEventHasOwner.cache_policy(), CachePolicy::Strict);
    }
}
