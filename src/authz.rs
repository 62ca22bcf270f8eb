//! Role-based authorization decisions.
//!
//! Every role-gated endpoint asks this module for a verdict instead of comparing role
//! strings inline. The functions here are pure: they see role sets and identifiers,
//! never the store.

use crate::roles::{Role, RoleSet};
use std::fmt;
use uuid::Uuid;

/// Action
///
/// A role-gated operation. `allowed_roles` is the single permission table for the
/// whole service; holding any one of the listed roles grants the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListUsers,
    CreateClub,
    UpdateClub,
    DeleteClub,
    ViewClubMembers,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    ReviewEvent,
    ViewAttendance,
    DeleteComment,
}

impl Action {
    pub const fn allowed_roles(self) -> &'static [Role] {
        use Role::*;
        match self {
            Action::ListUsers => &[Admin, Sto, Patron],
            Action::CreateClub => &[Admin, Sto],
            Action::UpdateClub => &[Admin, Sto, Patron, ClubLeader],
            Action::DeleteClub => &[Sto, Patron, Admin],
            Action::ViewClubMembers => &[ClubLeader, Patron, Sto],
            Action::CreateEvent => &[ClubLeader],
            Action::UpdateEvent | Action::DeleteEvent => &[ClubLeader, Patron, Sto],
            Action::ReviewEvent => &[Sto, Patron],
            Action::ViewAttendance => &[ClubLeader, Patron, Sto],
            Action::DeleteComment => &[ClubLeader, Patron, Sto],
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Action::ListUsers => "list users",
            Action::CreateClub => "create clubs",
            Action::UpdateClub => "update clubs",
            Action::DeleteClub => "delete clubs",
            Action::ViewClubMembers => "view club members",
            Action::CreateEvent => "create events",
            Action::UpdateEvent => "update events",
            Action::DeleteEvent => "delete events",
            Action::ReviewEvent => "approve or reject events",
            Action::ViewAttendance => "view the attendance list",
            Action::DeleteComment => "delete comments",
        }
    }
}

/// Direction of a role mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    Grant,
    Revoke,
}

impl fmt::Display for RoleChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RoleChange::Grant => "assigned",
            RoleChange::Revoke => "removed",
        })
    }
}

/// Denied
///
/// Why an authorization check failed. Always surfaces as 403 Forbidden.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denied {
    #[error("You cannot change your own roles.")]
    OwnRoles,
    #[error("The {role} role cannot be {change} through the API.")]
    NotAssignable { role: Role, change: RoleChange },
    #[error("The {role} role can only be {change} by: {}.", list_roles(granting_roles_of(.role)))]
    RoleChangeNotPermitted { role: Role, change: RoleChange },
    #[error("Forbidden: {}", requirement(.0))]
    InsufficientRole(Action),
}

fn list_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|role| role.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn granting_roles_of(role: &Role) -> &'static [Role] {
    granting_roles(*role)
}

fn requirement(action: &Action) -> String {
    format!(
        "only {} can {}.",
        list_roles(action.allowed_roles()),
        action.describe()
    )
}

/// Checks `actor` against the permission table for `action`.
pub fn authorize(actor: &RoleSet, action: Action) -> Result<(), Denied> {
    if actor.any_of(action.allowed_roles()) {
        Ok(())
    } else {
        Err(Denied::InsufficientRole(action))
    }
}

/// granting_roles
///
/// Which roles may grant or revoke `role`. An empty slice means the role is not
/// managed through the API at all (`student`/`staff` come from registration, `admin`
/// is provisioned out of band).
pub const fn granting_roles(role: Role) -> &'static [Role] {
    use Role::*;
    match role {
        Sto => &[Admin],
        Patron => &[Admin, Sto],
        ClubLeader => &[Admin, Sto, Patron],
        Admin | Student | Staff => &[],
    }
}

/// authorize_role_change
///
/// Decides whether `actor_id` (holding `actor_roles`) may grant or revoke `role` on
/// `target_id`. The self-change check runs before any rule, so nobody can edit their
/// own role set regardless of rank.
///
/// Target existence and redundancy (granting a held role, revoking a missing one) are
/// not decided here; they depend on stored state and are reported as 404 and 409 by
/// the caller.
pub fn authorize_role_change(
    actor_id: Uuid,
    actor_roles: &RoleSet,
    target_id: Uuid,
    role: Role,
    change: RoleChange,
) -> Result<(), Denied> {
    if actor_id == target_id {
        return Err(Denied::OwnRoles);
    }

    let granting = granting_roles(role);
    if granting.is_empty() {
        return Err(Denied::NotAssignable { role, change });
    }
    if !actor_roles.any_of(granting) {
        return Err(Denied::RoleChangeNotPermitted { role, change });
    }
    Ok(())
}

/// Which events an actor may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventVisibility {
    All,
    ApprovedOnly,
}

/// event_visibility
///
/// Anonymous callers and callers whose roles are all within {student, staff} only see
/// approved events. Any other role lifts the filter.
pub fn event_visibility(actor: Option<&RoleSet>) -> EventVisibility {
    match actor {
        Some(roles) if roles.iter().any(|r| !matches!(r, Role::Student | Role::Staff)) => {
            EventVisibility::All
        }
        _ => EventVisibility::ApprovedOnly,
    }
}
