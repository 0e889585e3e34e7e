use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::role::Role;

/// Represents a user in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The unique identifier for the user.
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    /// Whether the user wants an email when a post is published.
    pub email_notification: bool,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A user row together with its password hash, used only by the login path.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Fields needed to insert a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub email_notification: bool,
}

/// Registration form as posted by the frontend.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserCreate {
    #[garde(length(min = 1, max = 100))]
    pub first_name: String,
    #[garde(length(min = 1, max = 100))]
    pub last_name: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 8, max = 128))]
    pub password: String,
    /// The access level the new user asks for.
    #[serde(rename = "restricted")]
    #[garde(custom(requestable_role))]
    pub access_request: Role,
    #[serde(default)]
    #[garde(skip)]
    pub email_notification: bool,
}

/// Envelope used by the registration endpoint.
#[derive(Debug, Deserialize)]
pub struct AccountCreationRequest {
    #[serde(rename = "accountDetails")]
    pub account_details: UserCreate,
}

/// Profile update form. The target id comes from the path.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[garde(length(min = 1, max = 100))]
    pub first_name: String,
    #[garde(length(min = 1, max = 100))]
    pub last_name: String,
    #[garde(email)]
    pub email: String,
    #[garde(skip)]
    pub role: Role,
    #[serde(default)]
    #[garde(skip)]
    pub email_notification: bool,
}

/// Login form as posted by the frontend.
#[derive(Debug, Deserialize)]
pub struct UserLoginForm {
    #[serde(rename = "formData")]
    pub form_data: UserLogin,
}

#[derive(Deserialize)]
pub struct UserLogin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for UserLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserLogin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registration may ask for reader or privileged access, never admin.
fn requestable_role(role: &Role, _ctx: &()) -> garde::Result {
    match role {
        Role::Anonymous | Role::NonPrivileged | Role::Privileged => Ok(()),
        Role::Admin => Err(garde::Error::new("access request must be -1, 0 or 2")),
    }
}
