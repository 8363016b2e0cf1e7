//! User account models.

use chrono::{DateTime, Utc};

/// A named group an account belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Program administrator.
    Administrator,
    /// Class teacher.
    Teacher,
    /// Event volunteer.
    Volunteer,
    /// Enrolled student.
    Student,
    /// Outside educator.
    Educator,
    /// Any other group, kept by name.
    Other(String),
}

/// Tie-break order for accounts sharing one sender address.
pub const SENDER_ROLE_PRIORITY: [Role; 5] = [
    Role::Administrator,
    Role::Teacher,
    Role::Volunteer,
    Role::Student,
    Role::Educator,
];

impl Role {
    /// Parse from the stored group name.
    ///
    /// Group names are case-sensitive: `teacher` is not `Teacher`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "Administrator" => Self::Administrator,
            "Teacher" => Self::Teacher,
            "Volunteer" => Self::Volunteer,
            "Student" => Self::Student,
            "Educator" => Self::Educator,
            _ => Self::Other(s.to_string()),
        }
    }

    /// Group name as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Administrator => "Administrator",
            Self::Teacher => "Teacher",
            Self::Volunteer => "Volunteer",
            Self::Student => "Student",
            Self::Educator => "Educator",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// A platform user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    /// Row identifier.
    pub id: i64,
    /// Unique username, matched case-insensitively.
    pub username: String,
    /// Contact address. Several accounts may share one.
    pub email: String,
    /// Group memberships.
    pub roles: Vec<Role>,
    /// Account creation time.
    pub date_joined: DateTime<Utc>,
}

impl UserAccount {
    /// Check membership in a group.
    #[must_use]
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}
