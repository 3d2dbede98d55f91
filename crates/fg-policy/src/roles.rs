// SPDX-License-Identifier: MIT OR Apache-2.0
//! The role-composed authoring style.
//!
//! Each role lists only what it newly grants. Higher roles are pre-composed
//! with the grants of every lower role, and [`rbac`](crate::compose::rbac)
//! gates each composed tree on its role. The result decides every path the
//! same way as [`flat::policy`](crate::flat::policy).

use crate::compose::{RolePolicySet, RuleTree, allow, and, not, or, or_merge, rbac};
use crate::flat::{attendant_unless_locked, invited_or_manager};
use crate::rules::*;
use crate::tree::{Tree, TreeError};
use fg_core::Role;

/// Grants that hold for everyone, logged in or not.
pub fn defaults() -> Result<RuleTree, TreeError> {
    let public = not(parent_is_private());
    let event_field = |name| (name, public.clone());
    Tree::from_sections([
        ("User", vec![("_id", allow())]),
        (
            "Category",
            vec![("_id", allow()), ("name", allow()), ("events", allow())],
        ),
        (
            "Event",
            vec![
                event_field("_id"),
                event_field("title"),
                event_field("time"),
                event_field("description"),
                event_field("location"),
                event_field("owner"),
                event_field("private"),
                event_field("attendants"),
                event_field("managers"),
            ],
        ),
        ("Query", vec![("events", allow())]),
        (
            "Mutation",
            vec![
                ("createUser", allow()),
                ("login", allow()),
                ("unsubscribe", allow()),
                ("request", not(arg_is_private())),
            ],
        ),
    ])
}

/// What any logged-in account may do.
pub fn free() -> Result<RuleTree, TreeError> {
    let invited_or_attending = or([caller_is_invited_to_parent(), caller_attends_parent()]);
    let event_field = |name| (name, invited_or_attending.clone());
    let post_content = or([attendant_unless_locked(), caller_moderates_parent()]);
    let post_moderation = or([caller_manages_parent(), caller_moderates_parent()]);
    let own = || is_caller(Reference::Parent);

    Tree::from_sections([
        (
            "User",
            vec![
                ("name", allow()),
                ("surname", allow()),
                ("username", allow()),
                ("role", allow()),
                ("moderates", allow()),
                ("attends", own()),
                ("requests", own()),
                ("authored", own()),
                ("subscribes", own()),
                ("invitations", own()),
                ("invites", own()),
            ],
        ),
        (
            "Category",
            vec![
                ("moderators", allow()),
                ("subscribers", caller_moderates_parent()),
            ],
        ),
        (
            "Invitation",
            vec![
                ("_id", invited_or_manager()),
                ("from", invited_or_manager()),
                ("invited", invited_or_manager()),
                ("to", invited_or_manager()),
            ],
        ),
        (
            "Event",
            vec![
                event_field("_id"),
                event_field("title"),
                event_field("time"),
                event_field("description"),
                event_field("location"),
                event_field("owner"),
                event_field("private"),
                event_field("attendants"),
                event_field("managers"),
                ("requests", caller_manages_parent()),
                ("invited", caller_manages_parent()),
                (
                    "messageBoard",
                    or([caller_attends_parent(), caller_moderates_parent()]),
                ),
            ],
        ),
        (
            "Post",
            vec![
                ("_id", post_content.clone()),
                ("content", post_content.clone()),
                ("author", post_content.clone()),
                ("postedAt", post_content),
                ("flagged", post_moderation.clone()),
                ("locked", post_moderation),
            ],
        ),
        (
            "Query",
            vec![("users", allow()), ("usersByUsername", allow())],
        ),
        (
            "Mutation",
            vec![
                ("editUser", is_caller(Reference::Arg)),
                ("createEvent", not(arg_is_private())),
                (
                    "editEvent",
                    and([
                        or([caller_manages_arg(), caller_owns_arg()]),
                        not(arg_is_private()),
                    ]),
                ),
                ("addCategories", caller_manages_arg()),
                (
                    "removeCategories",
                    or([caller_manages_arg(), caller_moderates_arg()]),
                ),
                ("deleteEvent", caller_owns_arg()),
                (
                    "kick",
                    and([
                        not(and([caller_owns_arg(), is_caller(Reference::Arg)])),
                        or([is_caller(Reference::Arg), caller_manages_arg()]),
                    ]),
                ),
                ("promote", caller_owns_arg()),
                (
                    "demote",
                    and([caller_owns_arg(), not(is_caller(Reference::Arg))]),
                ),
                ("invite", or([caller_manages_arg(), caller_owns_arg()])),
                ("acceptInvitation", caller_is_invited_to_arg()),
                (
                    "declineInvitation",
                    or([
                        caller_is_invited_to_arg(),
                        caller_manages_arg(),
                        caller_owns_arg(),
                    ]),
                ),
                ("acceptRequest", or([caller_owns_arg(), caller_manages_arg()])),
                (
                    "declineRequest",
                    or([
                        caller_requests_arg(),
                        caller_manages_arg(),
                        caller_owns_arg(),
                    ]),
                ),
                ("createPost", caller_attends_arg()),
                ("flagPost", or([caller_attends_arg(), caller_moderates_arg()])),
                ("review", and([arg_is_flagged(), caller_manages_arg()])),
            ],
        ),
    ])
}

/// Additional grants of paying members.
pub fn premium() -> Result<RuleTree, TreeError> {
    Tree::from_sections([(
        "Mutation",
        vec![
            ("subscribe", allow()),
            ("createEvent", allow()),
            ("editEvent", or([caller_manages_arg(), caller_owns_arg()])),
        ],
    )])
}

/// Additional grants of category moderators.
pub fn moderator() -> Result<RuleTree, TreeError> {
    Tree::from_sections([(
        "Mutation",
        vec![("review", and([arg_is_flagged(), caller_moderates_arg()]))],
    )])
}

/// Additional grants of administrators.
pub fn administrator() -> Result<RuleTree, TreeError> {
    let post_fields = ["_id", "content", "author", "postedAt", "flagged", "locked"]
        .map(|f| (f, allow()));
    Tree::from_sections([
        ("Category", vec![("subscribers", allow())]),
        ("Event", vec![("messageBoard", allow())]),
        ("Post", post_fields.to_vec()),
        (
            "Mutation",
            vec![
                ("createCategory", allow()),
                ("editCategory", allow()),
                ("deleteCategory", allow()),
                ("assignModerator", arg_has_role(Role::Moderator)),
                ("removeModerator", allow()),
                ("setRole", allow()),
                ("deleteUser", allow()),
                ("removeCategories", allow()),
                ("deletePost", arg_is_locked()),
                ("flagPost", allow()),
                ("review", arg_is_flagged()),
                ("unlockPost", allow()),
            ],
        ),
    ])
}

/// The grants a role adds on top of the roles ranked below it.
pub fn unique_grants(role: Role) -> Result<RuleTree, TreeError> {
    match role {
        Role::Free => free(),
        Role::Premium => premium(),
        Role::Moderator => moderator(),
        Role::Administrator => administrator(),
    }
}

/// The per-role trees, each pre-composed with every lower role's grants.
pub fn role_policy_set() -> Result<RolePolicySet, TreeError> {
    let mut set = RolePolicySet::new(defaults()?);
    for role in Role::ALL {
        let inherited = role
            .and_below()
            .map(unique_grants)
            .collect::<Result<Vec<_>, _>>()?;
        set = set.with_role(role, or_merge(inherited)?);
    }
    Ok(set)
}

/// The effective tree of the role-composed style.
pub fn policy() -> Result<RuleTree, TreeError> {
    Ok(rbac(role_policy_set()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(tree: &RuleTree) -> Vec<String> {
        tree.leaves().into_iter().map(|(p, _)| p.join(".")).collect()
    }

    #[test]
    fn same_paths_as_flat() {
        let flat = crate::flat::policy().unwrap();
        let composed = policy().unwrap();
        assert_eq!(paths(&composed), paths(&flat));
    }

    #[test]
    fn premium_carries_free_grants() {
        let set = role_policy_set().unwrap();
        let premium = &set.roles[&Role::Premium];
        assert!(premium.leaf(&["Mutation", "createPost"]).is_some());
        assert_eq!(
            premium.leaf(&["Mutation", "createEvent"]).unwrap().describe(),
            "or(not(arg_is_private), allow)"
        );
    }

    #[test]
    fn administrators_inherit_every_lower_grant() {
        let set = role_policy_set().unwrap();
        let admin = &set.roles[&Role::Administrator];
        for role in Role::Administrator.and_below() {
            for (path, _) in unique_grants(role).unwrap().leaves() {
                assert!(admin.leaf(&path).is_some(), "{role} grant {path:?} missing");
            }
        }
        let free = &set.roles[&Role::Free];
        assert!(free.leaf(&["Mutation", "setRole"]).is_none());
    }

    #[test]
    fn defaults_widen_gated_event_fields() {
        let tree = policy().unwrap();
        let title = tree.leaf(&["Event", "title"]).unwrap().describe();
        assert!(title.starts_with("or(and(caller_has_role(FREE)"), "{title}");
        assert!(title.ends_with("not(parent_is_private))"), "{title}");
    }
}
