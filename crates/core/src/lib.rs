//! `guildgate-core`: identifiers and the error taxonomy shared by every crate.
//!
//! This crate has no I/O.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{GroupId, UserId};
