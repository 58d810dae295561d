// src/models/user.rs

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Letters, digits and `@.+-_`, the same character set accounts have always used.
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));

/// Role attached to an account and carried in its tokens.
///
/// Only `admin` and `student` can be assigned through the API. Anything else
/// that shows up in a token is kept as `Other` so the access layer can treat
/// it as an unprivileged identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Student,
    Other(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            "student" => Role::Student,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
            Role::Other(other) => other,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub email: String,
    pub first_name: String,
    pub last_name: String,

    /// User role: 'admin' or 'student'.
    pub role: String,

    #[serde(skip)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for an admin creating an account.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 3, max = 150, message = "Username length must be between 3 and 150 characters."),
        custom(function = validate_username)
    )]
    pub username: String,
    #[validate(length(min = 4, max = 128, message = "Password length must be between 4 and 128 characters."))]
    pub password: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    /// 'admin' or 'student'; defaults to 'student'.
    pub role: Option<String>,
}

/// DTO for updating an account. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 3, max = 150),
        custom(function = validate_username)
    )]
    pub username: Option<String>,
    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    pub role: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

pub fn validate_username(username: &str) -> Result<(), validator::ValidationError> {
    if !USERNAME_RE.is_match(username) {
        return Err(validator::ValidationError::new("invalid_username"));
    }
    Ok(())
}

/// Only the two real roles may be written to an account.
pub fn validate_assignable_role(role: &str) -> Result<(), validator::ValidationError> {
    match Role::parse(role) {
        Role::Admin | Role::Student => Ok(()),
        Role::Other(_) => Err(validator::ValidationError::new("invalid_role")),
    }
}
