//! Well-known role names.
//!
//! Two role vocabularies exist: the platform-wide [`Role`] carried by every
//! actor, and the per-project [`TeamRole`] held by project members.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_PROJECT_MANAGER: &str = "PROJECT_MANAGER";
pub const ROLE_USER: &str = "USER";

// ---------------------------------------------------------------------------
// Platform role
// ---------------------------------------------------------------------------

/// Platform-wide role supplied by the identity context for each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    ProjectManager,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => ROLE_ADMIN,
            Self::ProjectManager => ROLE_PROJECT_MANAGER,
            Self::User => ROLE_USER,
        }
    }

    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ROLE_ADMIN => Ok(Self::Admin),
            ROLE_PROJECT_MANAGER => Ok(Self::ProjectManager),
            ROLE_USER => Ok(Self::User),
            other => Err(CoreError::Validation(format!("Unknown role '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Team role
// ---------------------------------------------------------------------------

/// Role a member holds inside a single project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamRole {
    ProjectManager,
    TeamLead,
    Developer,
    Designer,
    Tester,
    Analyst,
    Member,
}

impl TeamRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProjectManager => "PROJECT_MANAGER",
            Self::TeamLead => "TEAM_LEAD",
            Self::Developer => "DEVELOPER",
            Self::Designer => "DESIGNER",
            Self::Tester => "TESTER",
            Self::Analyst => "ANALYST",
            Self::Member => "MEMBER",
        }
    }

    /// Team roles that grant edit rights on the project itself.
    pub fn can_manage_project(self) -> bool {
        matches!(self, Self::ProjectManager | Self::TeamLead)
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
