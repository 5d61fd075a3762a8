//! Group roles and explicit allowed-role sets.
//!
//! Roles are a closed set. There is no ordering between them: every
//! authorization call names the exact roles it accepts through a [`RoleSet`],
//! so reordering or adding a role never widens an existing check.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A member's role within one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    /// Convert to string for database storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Owner => 0b001,
            Self::Admin => 0b010,
            Self::Member => 0b100,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The exact set of roles an operation accepts.
///
/// # Example
///
/// ```rust
/// use groupgate::groups::{Role, RoleSet};
///
/// let governors = RoleSet::of(&[Role::Owner, Role::Admin]);
/// assert!(governors.contains(Role::Admin));
/// assert!(!governors.contains(Role::Member));
/// assert_eq!(governors, RoleSet::GOVERNORS);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    /// Owners and admins: the roles allowed to govern a group.
    pub const GOVERNORS: Self = Self::of(&[Role::Owner, Role::Admin]);

    /// Every role; any active member passes.
    pub const ANY_MEMBER: Self = Self::of(&[Role::Owner, Role::Admin, Role::Member]);

    /// Builds a set from an explicit list of roles.
    pub const fn of(roles: &[Role]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < roles.len() {
            bits |= roles[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// An empty set, which nobody passes.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns a copy of this set with `role` added.
    #[must_use]
    pub const fn with(self, role: Role) -> Self {
        Self(self.0 | role.bit())
    }

    pub const fn contains(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the roles in the set.
    pub fn iter(self) -> impl Iterator<Item = Role> {
        [Role::Owner, Role::Admin, Role::Member]
            .into_iter()
            .filter(move |role| self.contains(*role))
    }
}

impl fmt::Debug for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}
