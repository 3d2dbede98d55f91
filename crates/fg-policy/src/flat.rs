// SPDX-License-Identifier: MIT OR Apache-2.0
//! The flat authoring style: one rule per path, roles checked inline.

use crate::compose::{RuleTree, allow, and, not, or};
use crate::facts::Facts;
use crate::rules::*;
use crate::tree::{Tree, TreeError};
use fg_core::Role;
use fg_rule_engine::Rule;

fn admin() -> Rule<Facts> {
    caller_has_role(Role::Administrator)
}

fn premium_or_above() -> Rule<Facts> {
    or([
        caller_has_role(Role::Premium),
        caller_has_role(Role::Moderator),
        admin(),
    ])
}

/// Invitee of the parent invitation or manager of its event.
pub(crate) fn invited_or_manager() -> Rule<Facts> {
    or([caller_is_invited_to_parent(), caller_manages_parent()])
}

/// Attendant of the post's event, unless the post is locked and the caller
/// does not manage the event.
pub(crate) fn attendant_unless_locked() -> Rule<Facts> {
    and([
        caller_attends_parent(),
        or([not(parent_is_locked()), caller_manages_parent()]),
    ])
}

/// Every field of every type and every root operation.
pub fn policy() -> Result<RuleTree, TreeError> {
    let public_or_invited_or_attending = or([
        not(parent_is_private()),
        caller_is_invited_to_parent(),
        caller_attends_parent(),
    ]);
    let post_content = or([
        attendant_unless_locked(),
        caller_moderates_parent(),
        admin(),
    ]);
    let post_moderation = or([caller_manages_parent(), caller_moderates_parent(), admin()]);
    let event_field = |name| (name, public_or_invited_or_attending.clone());

    Tree::from_sections([
        (
            "User",
            vec![
                ("_id", allow()),
                ("name", is_logged_in()),
                ("surname", is_logged_in()),
                ("username", is_logged_in()),
                ("role", is_logged_in()),
                ("moderates", is_logged_in()),
                ("attends", is_caller(Reference::Parent)),
                ("requests", is_caller(Reference::Parent)),
                ("authored", is_caller(Reference::Parent)),
                ("subscribes", is_caller(Reference::Parent)),
                ("invitations", is_caller(Reference::Parent)),
                ("invites", is_caller(Reference::Parent)),
            ],
        ),
        (
            "Category",
            vec![
                ("_id", allow()),
                ("name", allow()),
                ("events", allow()),
                ("moderators", is_logged_in()),
                ("subscribers", or([caller_moderates_parent(), admin()])),
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
                    or([caller_attends_parent(), caller_moderates_parent(), admin()]),
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
            vec![
                ("users", is_logged_in()),
                ("usersByUsername", is_logged_in()),
                ("events", allow()),
            ],
        ),
        (
            "Mutation",
            vec![
                // categories
                ("createCategory", admin()),
                ("editCategory", admin()),
                ("deleteCategory", admin()),
                ("assignModerator", and([admin(), arg_has_role(Role::Moderator)])),
                ("removeModerator", admin()),
                // users
                ("createUser", allow()),
                ("login", allow()),
                ("editUser", is_caller(Reference::Arg)),
                ("setRole", admin()),
                ("deleteUser", admin()),
                ("subscribe", premium_or_above()),
                ("unsubscribe", allow()),
                // events
                (
                    "createEvent",
                    and([
                        is_logged_in(),
                        or([
                            not(arg_is_private()),
                            caller_has_role(Role::Premium),
                            caller_has_role(Role::Moderator),
                            admin(),
                        ]),
                    ]),
                ),
                (
                    "editEvent",
                    and([
                        or([caller_manages_arg(), caller_owns_arg()]),
                        or([
                            not(arg_is_private()),
                            caller_has_role(Role::Premium),
                            caller_has_role(Role::Moderator),
                            admin(),
                        ]),
                    ]),
                ),
                ("addCategories", caller_manages_arg()),
                (
                    "removeCategories",
                    or([caller_manages_arg(), caller_moderates_arg(), admin()]),
                ),
                ("deleteEvent", caller_owns_arg()),
                // event management
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
                // invitations
                (
                    "invite",
                    and([
                        is_logged_in(),
                        or([caller_manages_arg(), caller_owns_arg()]),
                    ]),
                ),
                ("acceptInvitation", caller_is_invited_to_arg()),
                (
                    "declineInvitation",
                    or([
                        caller_is_invited_to_arg(),
                        caller_manages_arg(),
                        caller_owns_arg(),
                    ]),
                ),
                // requests
                ("request", not(arg_is_private())),
                ("acceptRequest", or([caller_owns_arg(), caller_manages_arg()])),
                (
                    "declineRequest",
                    or([
                        caller_requests_arg(),
                        caller_manages_arg(),
                        caller_owns_arg(),
                    ]),
                ),
                // posts
                ("createPost", and([is_logged_in(), caller_attends_arg()])),
                ("deletePost", and([admin(), arg_is_locked()])),
                (
                    "flagPost",
                    or([caller_attends_arg(), caller_moderates_arg(), admin()]),
                ),
                (
                    "review",
                    and([
                        arg_is_flagged(),
                        or([
                            caller_manages_arg(),
                            admin(),
                            and([caller_has_role(Role::Moderator), caller_moderates_arg()]),
                        ]),
                    ]),
                ),
                ("unlockPost", admin()),
            ],
        ),
    ])
}
