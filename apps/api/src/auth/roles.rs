use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three fixed access tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    TeamLead,
    Admin,
}

/// Every authenticated role.
pub const ANY_ROLE: &[Role] = &[Role::User, Role::TeamLead, Role::Admin];
/// Roles allowed to see team data.
pub const MANAGER_ROLES: &[Role] = &[Role::TeamLead, Role::Admin];
pub const ADMIN_ROLES: &[Role] = &[Role::Admin];

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::TeamLead => "team_lead",
            Role::Admin => "admin",
        }
    }

    /// Access is granted iff this role is a member of `allowed`.
    pub fn is_allowed(self, allowed: &[Role]) -> bool {
        allowed.contains(&self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ANY_ROLE
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}
