//! Startup wiring.
//!
//! Connecting to storage and loading the group catalog are retried with a
//! fixed backoff; running out of attempts is fatal for the process.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use guildgate_auth::{CredentialHasher, TokenError, TokenIssuer};

use crate::catalog::{CatalogError, GroupCatalog};
use crate::config::{ServiceConfig, StartupConfig};
use crate::directory::UserDirectory;
use crate::session::SessionManager;
use crate::storage::{PostgresStorage, Storage, StorageError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("storage connection failed after {attempts} attempts: {source}")]
    Storage {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error("group catalog load failed after {attempts} attempts: {source}")]
    Catalog {
        attempts: u32,
        #[source]
        source: CatalogError,
    },

    #[error("token issuer misconfigured: {0}")]
    Token(#[from] TokenError),
}

/// Run `op` until it succeeds or `policy.retries` extra attempts are used up.
///
/// Returns the last error together with the number of attempts made.
pub async fn retry_fixed<T, E, F, Fut>(what: &str, policy: &StartupConfig, mut op: F) -> Result<T, (u32, E)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: core::fmt::Display,
{
    let max_attempts = policy.retries.saturating_add(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts => {
                warn!(what, attempt, max_attempts, error = %err, backoff_ms = policy.backoff.as_millis() as u64, "startup step failed; retrying");
                tokio::time::sleep(policy.backoff).await;
            }
            Err(err) => return Err((attempt, err)),
        }
    }
}

/// The long-lived components shared by every request handler.
#[derive(Clone)]
pub struct Services {
    pub storage: Arc<dyn Storage>,
    pub catalog: Arc<GroupCatalog>,
    pub directory: Arc<UserDirectory>,
    pub sessions: Arc<SessionManager>,
    pub hasher: CredentialHasher,
}

impl core::fmt::Debug for Services {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Services")
            .field("catalog", &self.catalog)
            .field("directory", &self.directory)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Wire components around an already-connected storage and loaded catalog.
    pub fn new(
        storage: Arc<dyn Storage>,
        catalog: GroupCatalog,
        config: &ServiceConfig,
        hasher: CredentialHasher,
    ) -> Result<Self, BootstrapError> {
        let issuer = TokenIssuer::new(
            config.token.secret.as_bytes(),
            config.token.issuer.clone(),
            config.token.expiry(),
        )?;

        let catalog = Arc::new(catalog);
        let directory = Arc::new(UserDirectory::new(storage.clone(), catalog.clone()));
        let sessions = Arc::new(SessionManager::new(issuer, storage.clone()));

        Ok(Self {
            storage,
            catalog,
            directory,
            sessions,
            hasher,
        })
    }

    /// Load the catalog from `storage` (with retries) and wire everything.
    pub async fn load(storage: Arc<dyn Storage>, config: &ServiceConfig) -> Result<Self, BootstrapError> {
        let catalog = retry_fixed("load group catalog", &config.startup, || GroupCatalog::load(storage.as_ref()))
            .await
            .map_err(|(attempts, source)| BootstrapError::Catalog { attempts, source })?;
        info!(groups = catalog.len(), "catalog ready");

        Self::new(storage, catalog, config, CredentialHasher::default())
    }

    /// Connect to Postgres (with retries), then [`Services::load`].
    pub async fn connect_postgres(config: &ServiceConfig) -> Result<Self, BootstrapError> {
        let storage = retry_fixed("connect to postgres", &config.startup, || {
            PostgresStorage::connect(&config.storage)
        })
        .await
        .map_err(|(attempts, source)| BootstrapError::Storage { attempts, source })?;
        info!("storage connected");

        Self::load(Arc::new(storage), config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use guildgate_auth::Group;
    use guildgate_core::GroupId;

    use crate::storage::{InMemoryStorage, StorageOp};

    fn policy(retries: u32) -> StartupConfig {
        StartupConfig {
            retries,
            backoff: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<u32, (u32, String)> = retry_fixed("flaky", &policy(5), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 { Err(format!("attempt {n}")) } else { Ok(n) }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_retries() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), (u32, &str)> = retry_fixed("down", &policy(2), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("refused")
        })
        .await;

        assert_eq!(result, Err((3, "refused")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn load_retries_catalog_listing() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert_group(Group::new(GroupId::new(1), "players"));
        storage.fail(StorageOp::LoadGroups);

        let mut config = ServiceConfig::default();
        config.startup = policy(1);

        let err = Services::load(storage.clone(), &config).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Catalog { attempts: 2, .. }));
        assert_eq!(storage.calls(StorageOp::LoadGroups), 2);

        storage.recover(StorageOp::LoadGroups);
        let services = Services::load(storage, &config).await.unwrap();
        assert_eq!(services.catalog.len(), 1);
        assert!(services.directory.is_empty());
    }
}
