use serde::{Deserialize, Serialize};

/// Realm-level role of a user. The integer values are what gets stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    Admin,
    Moderator,
    #[default]
    Member,
    Guest,
}

impl UserRole {
    pub const fn as_i32(self) -> i32 {
        match self {
            UserRole::Owner => 100,
            UserRole::Admin => 200,
            UserRole::Moderator => 300,
            UserRole::Member => 400,
            UserRole::Guest => 600,
        }
    }

    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            100 => Some(UserRole::Owner),
            200 => Some(UserRole::Admin),
            300 => Some(UserRole::Moderator),
            400 => Some(UserRole::Member),
            600 => Some(UserRole::Guest),
            _ => None,
        }
    }

    pub const fn is_realm_admin(self) -> bool {
        matches!(self, UserRole::Owner | UserRole::Admin)
    }

    pub const fn is_guest(self) -> bool {
        matches!(self, UserRole::Guest)
    }
}
