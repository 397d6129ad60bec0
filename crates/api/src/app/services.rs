//! Request-level operations over the shared [`Services`].
//!
//! Both the REST routes and the RPC surface go through [`GuildgateService`],
//! so a login or a token check behaves the same whichever way it arrives.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use guildgate_auth::{Scope, SessionStatus, User};
use guildgate_infra::{DirectoryError, Services};
use guildgate_rpc::{
    AuthResponse, AuthUserCredentialsRequest, HasPermissionRequest, HasPermissionResponse, PingMessage, RpcError,
    UserService, ValidateTokenRequest, ValidateTokenResponse,
};

use crate::app::errors::AuthError;

/// Platform label recorded on sessions created by credentials login.
pub const WEB_PLATFORM: &str = "web";

/// Response code for a token check that could not reach storage.
pub const VALIDATE_STORAGE_ERROR: i32 = 4;

#[derive(Debug, Clone)]
pub struct GuildgateService {
    services: Services,
}

impl GuildgateService {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Username-or-email plus password login; issues a `web` session.
    pub async fn login(&self, req: AuthUserCredentialsRequest) -> Result<(Arc<User>, String), AuthError> {
        let login = match (req.username.is_empty(), req.email.is_empty()) {
            (false, true) => req.username.as_str(),
            (true, false) => req.email.as_str(),
            _ => return Err(AuthError::AmbiguousLogin),
        };
        if req.password.is_empty() {
            return Err(AuthError::EmptyPassword);
        }

        let user = self.services.directory.get_by_username(login).await.map_err(|e| match e {
            DirectoryError::NotFound | DirectoryError::Validation(_) => AuthError::InvalidCredentials,
            DirectoryError::Load(err) => {
                warn!(error = %err, "user load failed during login");
                AuthError::LoadFailed
            }
            DirectoryError::Groups(err) => {
                warn!(error = %err, "group load failed during login");
                AuthError::GroupsFailed
            }
        })?;

        // Verification is CPU-bound; run it on the blocking pool.
        let hasher = self.services.hasher.clone();
        let password = req.password;
        let encoded = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &encoded))
            .await
            .map_err(|e| {
                warn!(error = %e, "password verification task failed");
                AuthError::VerifyFailed
            })?;

        match verified {
            Ok(true) => {}
            Ok(false) => {
                info!(user_id = %user.id, "password mismatch");
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "stored credential could not be checked");
                return Err(AuthError::VerifyFailed);
            }
        }

        let session = self
            .services
            .sessions
            .issue(user.id, WEB_PLATFORM)
            .await
            .map_err(|e| {
                warn!(user_id = %user.id, error = %e, "session issuance failed");
                AuthError::SessionFailed
            })?;

        Ok((user, session.token))
    }

    /// Token check in the wire shape: code 0 whenever storage answered.
    pub async fn check_token(&self, token: &str) -> ValidateTokenResponse {
        match self.services.sessions.validate(token).await {
            Ok(status) => ValidateTokenResponse {
                code: 0,
                is_valid: status.is_valid(),
                user_id: status.user_id(),
                error: None,
            },
            Err(err) => {
                warn!(error = %err, "token validation failed");
                ValidateTokenResponse {
                    code: VALIDATE_STORAGE_ERROR,
                    is_valid: false,
                    user_id: SessionStatus::Unknown.user_id(),
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl UserService for GuildgateService {
    async fn ping(&self, mut req: PingMessage) -> Result<PingMessage, RpcError> {
        req.replied_at = Some(Utc::now());
        Ok(req)
    }

    async fn authenticate_user_credentials(
        &self,
        req: AuthUserCredentialsRequest,
    ) -> Result<AuthResponse, RpcError> {
        let resp = match self.login(req).await {
            Ok((user, token)) => AuthResponse {
                code: 0,
                user_id: user.id,
                username: user.username.clone(),
                email: user.email.clone(),
                token,
                error: None,
            },
            Err(err) => AuthResponse {
                code: err.code(),
                user_id: SessionStatus::Unknown.user_id(),
                username: String::new(),
                email: String::new(),
                token: String::new(),
                error: Some(err.to_string()),
            },
        };
        Ok(resp)
    }

    async fn has_permission(&self, req: HasPermissionRequest) -> Result<HasPermissionResponse, RpcError> {
        if req.user_id.is_unset() {
            return Err(RpcError::InvalidArgument("user id is zero".to_string()));
        }
        let scope: Scope = req
            .domain
            .parse()
            .map_err(|e: guildgate_auth::PermissionError| RpcError::InvalidArgument(e.to_string()))?;

        let user = self.services.directory.get_by_id(req.user_id).await.map_err(|e| match e {
            DirectoryError::NotFound => RpcError::NotFound(format!("user {}", req.user_id)),
            other => guildgate_core::DomainError::from(other).into(),
        })?;

        let permission = user.permission(scope, &req.permission);
        Ok(HasPermissionResponse {
            read: permission.read,
            write: permission.write,
            delete: permission.delete,
        })
    }

    async fn validate_token(&self, req: ValidateTokenRequest) -> Result<ValidateTokenResponse, RpcError> {
        Ok(self.check_token(&req.token).await)
    }
}
