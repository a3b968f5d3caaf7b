//! Account records and roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account role. Stored as lowercase text in `users.role`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Uploads into the groups it belongs to.
    #[default]
    Regular = 0,
    /// Manages users, groups, settings and approvals.
    Admin = 1,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("regular") {
            Ok(Role::Regular)
        } else if s.eq_ignore_ascii_case("admin") {
            Ok(Role::Admin)
        } else {
            Err(format!("unknown role: {s}"))
        }
    }
}

// Lets sqlx decode the TEXT column straight into a Role.
impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A row of the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    /// Unique, compared case-insensitively.
    pub username: String,
    /// Argon2 PHC string.
    pub password: String,
    pub display_name: String,
    pub email: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// Personal ceiling in bytes. `None` defers to the group limit, then the
    /// global default.
    pub storage_limit: Option<i64>,
    /// Inactive accounts can't log in or refresh.
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

/// Insert payload; `password` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub storage_limit: Option<i64>,
}

impl NewUser {
    /// A regular account without email or personal limit.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            display_name: display_name.into(),
            email: None,
            role: Role::Regular,
            storage_limit: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_storage_limit(mut self, limit: Option<i64>) -> Self {
        self.storage_limit = limit;
        self
    }
}

/// Partial update of a user.
///
/// Nullable columns use `Option<Option<_>>`: the outer `None` leaves the
/// column untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    /// Already hashed.
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<Option<String>>,
    pub role: Option<Role>,
    pub storage_limit: Option<Option<i64>>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.password.is_none()
            && self.display_name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.storage_limit.is_none()
            && self.is_active.is_none()
    }
}
