//! Connection primitives the supervisor drives.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use guildgate_rpc::{Method, RpcError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The call did not complete in time.
    #[error("timed out")]
    Timeout,

    /// The connection is closing or the peer refused it.
    #[error("connection closed: {0}")]
    Closed(String),

    /// The peer answered with an error.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("transport error: {0}")]
    Other(String),
}

/// Dial/close/call over some connection type.
///
/// Implementations must be cheap to share; the supervisor and the client hold
/// the same transport behind an `Arc`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    type Conn: Send + Sync + 'static;

    async fn dial(&self) -> Result<Self::Conn, TransportError>;

    async fn close(&self, conn: &Self::Conn) -> Result<(), TransportError>;

    async fn call(&self, conn: &Self::Conn, method: Method, body: Value) -> Result<Value, TransportError>;
}

/// JSON-over-HTTP transport for the service's `/rpc/<Method>` routes.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpConnection {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Closed(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    type Conn = HttpConnection;

    /// Build a client and check the service answers `/health`.
    async fn dial(&self) -> Result<HttpConnection, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let url = format!("{}/health", self.base_url);
        let resp = client.get(&url).send().await.map_err(map_reqwest_error)?;
        if !resp.status().is_success() {
            return Err(TransportError::Other(format!("health check returned {}", resp.status())));
        }

        Ok(HttpConnection {
            client,
            base_url: self.base_url.clone(),
        })
    }

    async fn close(&self, _conn: &HttpConnection) -> Result<(), TransportError> {
        // Pooled HTTP connections are released when the client is dropped.
        Ok(())
    }

    async fn call(&self, conn: &HttpConnection, method: Method, body: Value) -> Result<Value, TransportError> {
        let url = format!("{}{}", conn.base_url, method.path());
        let resp = conn.client.post(&url).json(&body).send().await.map_err(map_reqwest_error)?;

        let status = resp.status();
        let payload: Value = resp.json().await.map_err(map_reqwest_error)?;
        if status.is_success() {
            return Ok(payload);
        }

        match serde_json::from_value::<RpcError>(payload) {
            Ok(err) => Err(TransportError::Rpc(err)),
            Err(_) => Err(TransportError::Other(format!("{method} returned {status}"))),
        }
    }
}
