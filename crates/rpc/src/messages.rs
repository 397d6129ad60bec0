//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use guildgate_core::UserId;

use crate::Method;

/// Binds a request body to its method and response type.
pub trait RpcRequest: Serialize + DeserializeOwned + Send + Sync + 'static {
    const METHOD: Method;
    type Response: Serialize + DeserializeOwned + Send + Sync + 'static;
}

macro_rules! rpc_request {
    ($req:ty => $resp:ty, $method:expr) => {
        impl RpcRequest for $req {
            const METHOD: Method = $method;
            type Response = $resp;
        }
    };
}

/// Liveness probe; the server fills `replied_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMessage {
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub replied_at: Option<DateTime<Utc>>,
}

impl PingMessage {
    pub fn now() -> Self {
        Self {
            sent_at: Utc::now(),
            replied_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateTokenRequest {
    pub token: String,
}

/// `code` is 0 when the lookup itself succeeded, whatever the validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateTokenResponse {
    pub code: i32,
    pub is_valid: bool,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasPermissionRequest {
    pub user_id: UserId,
    pub permission: String,
    /// Scope name: `own`, `party`, `guild` or `global`.
    pub domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasPermissionResponse {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUserCredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPlatformRequest {
    pub platform: String,
    pub platform_user_id: String,
    pub platform_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthServerRequest {
    pub server_id: String,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthWebSocketTokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub code: i32,
    pub user_id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewTokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewTokenResponse {
    pub code: i32,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

rpc_request!(PingMessage => PingMessage, Method::Ping);
rpc_request!(AuthUserCredentialsRequest => AuthResponse, Method::AuthenticateUserCredentials);
rpc_request!(AuthPlatformRequest => AuthResponse, Method::AuthenticatePlatform);
rpc_request!(AuthServerRequest => AuthResponse, Method::AuthenticateServer);
rpc_request!(AuthWebSocketTokenRequest => AuthResponse, Method::AuthenticateWebSocketToken);
rpc_request!(HasPermissionRequest => HasPermissionResponse, Method::HasPermission);
rpc_request!(ValidateTokenRequest => ValidateTokenResponse, Method::ValidateToken);
rpc_request!(RenewTokenRequest => RenewTokenResponse, Method::RenewToken);
