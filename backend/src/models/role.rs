//! Marketplace roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse identity classification used to gate features.
///
/// Stored and transmitted in upper case (`PLAYER`, `DEVELOPER`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Player,
    Developer,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Player, Role::Developer, Role::Moderator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "PLAYER",
            Role::Developer => "DEVELOPER",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts the wire form (`PLAYER`) and the display form (`Player`).
    /// Anything else is rejected so callers fail closed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLAYER" | "Player" => Ok(Role::Player),
            "DEVELOPER" | "Developer" => Ok(Role::Developer),
            "MODERATOR" | "Moderator" => Ok(Role::Moderator),
            "ADMIN" | "Admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
