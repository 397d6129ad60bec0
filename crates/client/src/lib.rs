//! `guildgate-client`: user service client with a supervised connection.
//!
//! A [`ConnectionSupervisor`] keeps one connection to the service alive
//! (periodic ping, bounded reconnect). [`UserServiceClient`] issues calls over
//! whatever connection is currently live and fails fast when there is none.

pub mod client;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{ClientError, UserServiceClient};
pub use supervisor::{ConnectionState, ConnectionSupervisor, SupervisorConfig, SupervisorHandle, SupervisorStats};
pub use transport::{HttpTransport, Transport, TransportError};
