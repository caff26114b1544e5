use serde::{Deserialize, Serialize};

use turnstile_core::UserRecord;

// ─────────────────────────────────────────────────────────────────────────────
// Form inputs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AddUserForm {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeForm {
    #[serde(default)]
    pub new_email: String,
    #[serde(default)]
    pub new_password: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Page views
// ─────────────────────────────────────────────────────────────────────────────

/// A user as shown to clients; never includes the password hash.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub username: String,
    pub email: String,
    pub role: String,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self {
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleView {
    pub name: String,
    pub rank: u32,
}

#[derive(Debug, Serialize)]
pub struct LoginPage {
    pub messages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub user: UserView,
    pub messages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminPage {
    pub user: UserView,
    pub users: Vec<UserView>,
    pub roles: Vec<RoleView>,
    pub messages: Vec<String>,
}
