//! `guildgate-rpc`: the user service contract shared by server and clients.
//!
//! Messages travel as JSON bodies on `POST /rpc/<Method>`.

pub mod error;
pub mod messages;
pub mod method;
pub mod service;

pub use error::RpcError;
pub use messages::*;
pub use method::Method;
pub use service::{UserService, dispatch};
