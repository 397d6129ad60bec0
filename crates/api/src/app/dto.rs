use serde::{Deserialize, Serialize};

use guildgate_auth::User;
use guildgate_core::UserId;

/// Successful credentials login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub token: String,
}

impl LoginResponse {
    pub fn new(user: &User, token: String) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            token,
        }
    }
}
