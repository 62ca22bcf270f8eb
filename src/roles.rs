use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// The closed set of capability tags a user can carry. Serialized in snake_case
/// (`"club_leader"`), which is also the representation stored in `user_roles.role`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Student,
    Staff,
    Admin,
    Sto,
    Patron,
    ClubLeader,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Student,
        Role::Staff,
        Role::Admin,
        Role::Sto,
        Role::Patron,
        Role::ClubLeader,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
            Role::Admin => "admin",
            Role::Sto => "sto",
            Role::Patron => "patron",
            Role::ClubLeader => "club_leader",
        }
    }

    /// The role a freshly registered account starts with, derived from the
    /// registration number prefix (`R…` students, `S…` staff).
    pub fn for_registration_number(reg_number: &str) -> Option<Role> {
        match reg_number.chars().next() {
            Some('R') => Some(Role::Student),
            Some('S') => Some(Role::Staff),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// RoleSet
///
/// A user's roles. Backed by an ordered set, so duplicates are unrepresentable and the
/// JSON output (`["club_leader", "student"]`) is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// True when at least one of `roles` is held.
    pub fn any_of(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.0.contains(role))
    }

    /// Returns false if the role was already present.
    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    /// Returns false if the role was not present.
    pub fn remove(&mut self, role: Role) -> bool {
        self.0.remove(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Role> {
        self.iter().collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}
