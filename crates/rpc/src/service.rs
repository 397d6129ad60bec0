use serde_json::Value;

use crate::messages::*;
use crate::{Method, RpcError};

/// Server side of the user service.
///
/// Every method defaults to [`RpcError::Unimplemented`], so an implementation
/// only overrides what it supports and stays source-compatible when methods
/// are added to the contract.
#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    async fn ping(&self, _req: PingMessage) -> Result<PingMessage, RpcError> {
        Err(RpcError::Unimplemented(Method::Ping))
    }

    async fn authenticate_user_credentials(
        &self,
        _req: AuthUserCredentialsRequest,
    ) -> Result<AuthResponse, RpcError> {
        Err(RpcError::Unimplemented(Method::AuthenticateUserCredentials))
    }

    async fn authenticate_platform(&self, _req: AuthPlatformRequest) -> Result<AuthResponse, RpcError> {
        Err(RpcError::Unimplemented(Method::AuthenticatePlatform))
    }

    async fn authenticate_server(&self, _req: AuthServerRequest) -> Result<AuthResponse, RpcError> {
        Err(RpcError::Unimplemented(Method::AuthenticateServer))
    }

    async fn authenticate_web_socket_token(
        &self,
        _req: AuthWebSocketTokenRequest,
    ) -> Result<AuthResponse, RpcError> {
        Err(RpcError::Unimplemented(Method::AuthenticateWebSocketToken))
    }

    async fn has_permission(&self, _req: HasPermissionRequest) -> Result<HasPermissionResponse, RpcError> {
        Err(RpcError::Unimplemented(Method::HasPermission))
    }

    async fn validate_token(&self, _req: ValidateTokenRequest) -> Result<ValidateTokenResponse, RpcError> {
        Err(RpcError::Unimplemented(Method::ValidateToken))
    }

    async fn renew_token(&self, _req: RenewTokenRequest) -> Result<RenewTokenResponse, RpcError> {
        Err(RpcError::Unimplemented(Method::RenewToken))
    }
}

fn decode<R: RpcRequest>(body: Value) -> Result<R, RpcError> {
    serde_json::from_value(body).map_err(|e| RpcError::InvalidArgument(format!("{}: {}", R::METHOD, e)))
}

fn encode<T: serde::Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::Internal(e.to_string()))
}

/// Decode a JSON body for `method`, invoke the service and encode the reply.
pub async fn dispatch<S>(service: &S, method: Method, body: Value) -> Result<Value, RpcError>
where
    S: UserService + ?Sized,
{
    match method {
        Method::Ping => encode(service.ping(decode(body)?).await?),
        Method::AuthenticateUserCredentials => {
            encode(service.authenticate_user_credentials(decode(body)?).await?)
        }
        Method::AuthenticatePlatform => encode(service.authenticate_platform(decode(body)?).await?),
        Method::AuthenticateServer => encode(service.authenticate_server(decode(body)?).await?),
        Method::AuthenticateWebSocketToken => {
            encode(service.authenticate_web_socket_token(decode(body)?).await?)
        }
        Method::HasPermission => encode(service.has_permission(decode(body)?).await?),
        Method::ValidateToken => encode(service.validate_token(decode(body)?).await?),
        Method::RenewToken => encode(service.renew_token(decode(body)?).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    struct PingOnly;

    #[async_trait::async_trait]
    impl UserService for PingOnly {
        async fn ping(&self, mut req: PingMessage) -> Result<PingMessage, RpcError> {
            req.replied_at = Some(Utc::now());
            Ok(req)
        }
    }

    #[tokio::test]
    async fn overridden_method_is_served() {
        let body = serde_json::to_value(PingMessage::now()).unwrap();
        let reply: PingMessage = serde_json::from_value(dispatch(&PingOnly, Method::Ping, body).await.unwrap()).unwrap();
        assert!(reply.replied_at.is_some());
    }

    #[tokio::test]
    async fn every_other_method_is_unimplemented() {
        let bodies = [
            (Method::AuthenticateUserCredentials, json!({"username": "a", "password": "b"})),
            (Method::AuthenticatePlatform, json!({"platform": "steam", "platform_user_id": "1", "platform_token": "t"})),
            (Method::AuthenticateServer, json!({"server_id": "s", "secret": "x"})),
            (Method::AuthenticateWebSocketToken, json!({"token": "t"})),
            (Method::HasPermission, json!({"user_id": 1, "permission": "p", "domain": "own"})),
            (Method::ValidateToken, json!({"token": "t"})),
            (Method::RenewToken, json!({"token": "t"})),
        ];
        for (method, body) in bodies {
            assert_eq!(
                dispatch(&PingOnly, method, body).await,
                Err(RpcError::Unimplemented(method))
            );
        }
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_argument() {
        let err = dispatch(&PingOnly, Method::Ping, json!({"nope": true})).await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidArgument(msg) if msg.starts_with("Ping")));
    }
}
