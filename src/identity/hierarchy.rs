//! Ordered role hierarchy. Index 0 is maximal privilege; authorization is an
//! index comparison over the fixed set, and any name outside the set never grants.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Owner,
    SuperAdmin,
    Admin,
    Editor,
    Viewer,
}

/// The fixed ordering, most to least privileged.
pub const ROLE_HIERARCHY: [Role; 5] =
    [Role::Owner, Role::SuperAdmin, Role::Admin, Role::Editor, Role::Viewer];

impl Role {
    /// Position in the hierarchy; lower rank is more privileged.
    pub fn rank(self) -> usize {
        match self {
            Role::Owner => 0,
            Role::SuperAdmin => 1,
            Role::Admin => 2,
            Role::Editor => 3,
            Role::Viewer => 4,
        }
    }

    /// Exact-name lookup. Role names are case-sensitive; anything unknown
    /// yields None and therefore never authorizes.
    pub fn parse(name: &str) -> Option<Role> {
        match name {
            "Owner" => Some(Role::Owner),
            "SuperAdmin" => Some(Role::SuperAdmin),
            "Admin" => Some(Role::Admin),
            "Editor" => Some(Role::Editor),
            "Viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "Owner",
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::Editor => "Editor",
            Role::Viewer => "Viewer",
        }
    }

    /// True iff this role is at least as privileged as `required`.
    /// Total over all pairs; a role always satisfies itself.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() <= required.rank()
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
