use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use guildgate_core::{DomainError, UserId};
use guildgate_rpc::{
    HasPermissionRequest, HasPermissionResponse, PingMessage, RpcRequest, ValidateTokenRequest, ValidateTokenResponse,
};

use crate::supervisor::{ConnectionState, ConnectionSupervisor, SupervisorConfig, SupervisorHandle};
use crate::transport::{Transport, TransportError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no live connection (state: {0})")]
    NotConnected(ConnectionState),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service answered but reported a failure code.
    #[error("service rejected the request with code {code}: {error}")]
    Rejected { code: i32, error: String },

    #[error("could not encode request: {0}")]
    Encode(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<ClientError> for DomainError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotConnected(_) => DomainError::connectivity(err.to_string()),
            ClientError::Transport(TransportError::Rpc(e)) => e.into(),
            ClientError::Transport(e @ (TransportError::Timeout | TransportError::Closed(_))) => {
                DomainError::connectivity(e.to_string())
            }
            ClientError::Transport(TransportError::Other(msg)) => DomainError::unavailable(msg),
            ClientError::Rejected { .. } => DomainError::unavailable(err.to_string()),
            ClientError::Encode(msg) | ClientError::Decode(msg) => DomainError::internal(msg),
        }
    }
}

/// Calls the user service over a supervised connection.
///
/// Calls never wait for the supervisor: without a live connection they fail
/// with [`ClientError::NotConnected`] straight away.
pub struct UserServiceClient<T: Transport> {
    transport: Arc<T>,
    supervisor: SupervisorHandle<T>,
}

impl<T: Transport> UserServiceClient<T> {
    /// Spawn a supervisor for `transport` and wrap it.
    ///
    /// Must be called inside a tokio runtime.
    pub fn connect(transport: T, config: SupervisorConfig) -> Self {
        let transport = Arc::new(transport);
        let supervisor = ConnectionSupervisor::spawn(transport.clone(), config);
        Self { transport, supervisor }
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn supervisor(&self) -> &SupervisorHandle<T> {
        &self.supervisor
    }

    pub async fn call<R: RpcRequest>(&self, request: &R) -> Result<R::Response, ClientError> {
        let state = self.supervisor.state();
        let conn = match self.supervisor.connection() {
            Some(conn) if state != ConnectionState::Failed => conn,
            _ => return Err(ClientError::NotConnected(state)),
        };

        let body = serde_json::to_value(request).map_err(|e| ClientError::Encode(e.to_string()))?;
        let reply = self.transport.call(&conn, R::METHOD, body).await?;
        serde_json::from_value(reply).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Check a session token with the service.
    ///
    /// A non-zero response code means the service could not check the token
    /// at all, which is reported as [`ClientError::Rejected`].
    pub async fn validate_token(&self, token: &str) -> Result<ValidateTokenResponse, ClientError> {
        let resp = self
            .call(&ValidateTokenRequest {
                token: token.to_string(),
            })
            .await?;
        if resp.code != 0 {
            return Err(ClientError::Rejected {
                code: resp.code,
                error: resp.error.unwrap_or_default(),
            });
        }
        debug!(user_id = %resp.user_id, is_valid = resp.is_valid, "token validated");
        Ok(resp)
    }

    pub async fn has_permission(
        &self,
        user_id: UserId,
        permission: &str,
        domain: &str,
    ) -> Result<HasPermissionResponse, ClientError> {
        self.call(&HasPermissionRequest {
            user_id,
            permission: permission.to_string(),
            domain: domain.to_string(),
        })
        .await
    }

    pub async fn ping(&self) -> Result<PingMessage, ClientError> {
        self.call(&PingMessage::now()).await
    }

    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }
}

impl<T: Transport> core::fmt::Debug for UserServiceClient<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserServiceClient")
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use guildgate_rpc::{Method, RpcError};
    use serde_json::json;

    async fn connected(transport: FakeTransport) -> UserServiceClient<FakeTransport> {
        let client = UserServiceClient::connect(transport, SupervisorConfig::default());
        client.supervisor().wait_for(ConnectionState::Connected).await;
        client
    }

    #[tokio::test(start_paused = true)]
    async fn validate_token_returns_service_answer() {
        let transport = FakeTransport::new();
        transport.reply(
            Method::ValidateToken,
            Ok(json!({"code": 0, "is_valid": true, "user_id": 7})),
        );
        let client = connected(transport).await;

        let resp = client.validate_token("abc").await.unwrap();
        assert!(resp.is_valid);
        assert_eq!(resp.user_id, UserId::new(7));
    }

    #[tokio::test(start_paused = true)]
    async fn non_zero_code_is_an_error() {
        let transport = FakeTransport::new();
        transport.reply(
            Method::ValidateToken,
            Ok(json!({"code": 4, "is_valid": false, "user_id": 0, "error": "storage down"})),
        );
        let client = connected(transport).await;

        let err = client.validate_token("abc").await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { code: 4, ref error } if error == "storage down"));
    }

    #[tokio::test(start_paused = true)]
    async fn service_errors_map_to_domain_errors() {
        let transport = FakeTransport::new();
        transport.reply(
            Method::HasPermission,
            Err(TransportError::Rpc(RpcError::InvalidArgument("unknown domain".into()))),
        );
        let client = connected(transport).await;

        let err = client.has_permission(UserId::new(1), "chat", "galaxy").await.unwrap_err();
        assert_eq!(DomainError::from(err), DomainError::validation("unknown domain"));
    }

    #[tokio::test(start_paused = true)]
    async fn fails_fast_once_supervisor_gave_up() {
        let client = UserServiceClient::connect(
            FakeTransport::new().with_dials(vec![false; 6]),
            SupervisorConfig::default(),
        );
        assert_eq!(
            client.supervisor().wait_for(ConnectionState::Connected).await,
            ConnectionState::Failed
        );

        let started = tokio::time::Instant::now();
        let err = client.validate_token("abc").await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected(ConnectionState::Failed)));
        assert_eq!(started.elapsed(), std::time::Duration::ZERO);
        assert!(matches!(DomainError::from(err), DomainError::ConnectivityFailure(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn ping_round_trips_through_live_connection() {
        let client = connected(FakeTransport::new()).await;
        let reply = client.ping().await.unwrap();
        assert!(reply.replied_at.is_none());
        client.shutdown().await;
        assert!(matches!(client.ping().await, Err(ClientError::NotConnected(ConnectionState::Disconnected))));
    }
}
