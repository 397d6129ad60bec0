//! `guildgate-auth`: credential, token and permission primitives.
//!
//! This crate is decoupled from HTTP and storage; the infra crate wires these
//! types to persistence.

pub mod credential;
pub mod group;
pub mod permissions;
pub mod session;
pub mod token;
pub mod user;

pub use credential::{CredentialError, CredentialHasher, HashParams};
pub use group::Group;
pub use permissions::{Permission, PermissionError, PermissionGrant, PermissionIndex, Scope};
pub use session::{Session, SessionStatus};
pub use token::{TokenClaims, TokenError, TokenIssuer, TokenValidationError, validate_claims};
pub use user::User;
