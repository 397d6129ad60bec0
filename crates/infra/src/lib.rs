//! Infrastructure layer: configuration, storage, caches and session lifecycle.

pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod session;
pub mod storage;

pub use bootstrap::{BootstrapError, Services};
pub use catalog::{CatalogError, GroupCatalog};
pub use config::{ConfigError, ServiceConfig};
pub use directory::{DirectoryError, UserDirectory};
pub use session::{SessionError, SessionManager};
pub use storage::{InMemoryStorage, PostgresStorage, Storage, StorageError, StorageOp};
