//! Wiring of config, ledger, shared store and identity for one invocation.

use circle_config::ClientConfig;
use circle_core::{IdentityProvider, LocalLedger, MembershipIndex, Reconciler};
use circle_remote::RemoteStore;
use circle_storage::UserId;
use circle_store_sqlite::{SqliteRemoteStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::cli::Cli;

/// Identity read from the config file on every call, so a long-running
/// daemon notices `circle init` from another shell.
pub struct ConfigIdentity {
    path: PathBuf,
}

impl ConfigIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityProvider for ConfigIdentity {
    fn current_user_id(&self) -> Option<UserId> {
        let config = ClientConfig::load_from(&self.path).ok()?;
        config.user.map(|user| UserId::new(user.user_id))
    }
}

pub struct Context {
    pub config_path: PathBuf,
    pub config: ClientConfig,
    pub ledger: Arc<LocalLedger>,
    pub remote: Arc<dyn RemoteStore>,
    pub identity: Arc<ConfigIdentity>,
}

impl Context {
    pub async fn open(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = match &cli.config {
            Some(path) => path.clone(),
            None => ClientConfig::default_path()?,
        };
        let config = ClientConfig::load_or_default(&config_path)?;

        let ledger_url = cli.ledger_url.as_ref().or(config.ledger_url.as_ref());
        let store = match ledger_url {
            Some(url) => SqliteStore::open(url).await?,
            None => SqliteStore::open_default().await?,
        };

        let remote_url = cli.remote_url.as_ref().or(config.remote_url.as_ref());
        let remote = match remote_url {
            Some(url) => SqliteRemoteStore::open(url).await?,
            None => SqliteRemoteStore::open_default().await?,
        };
        debug!(config = %config_path.display(), "opened stores");

        Ok(Self {
            identity: Arc::new(ConfigIdentity::new(&config_path)),
            config_path,
            config,
            ledger: Arc::new(LocalLedger::new(Arc::new(store))),
            remote: Arc::new(remote),
        })
    }

    /// Signed-in context over an in-memory ledger and the given shared store.
    #[cfg(test)]
    pub(crate) async fn for_tests(
        dir: &Path,
        user_id: &str,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        let config_path = dir.join(format!("{user_id}.json"));
        let config = ClientConfig {
            user: Some(circle_config::UserConfig {
                user_id: user_id.to_string(),
                name: user_id.to_uppercase(),
                email: None,
            }),
            ..Default::default()
        };
        config.save_to(&config_path).unwrap();
        let store = SqliteStore::open_in_memory().await.unwrap();

        Self {
            identity: Arc::new(ConfigIdentity::new(&config_path)),
            config_path,
            config,
            ledger: Arc::new(LocalLedger::new(Arc::new(store))),
            remote,
        }
    }

    pub fn save_config(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.config.save_to(&self.config_path)?;
        Ok(())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn user_id(&self) -> Result<UserId, Box<dyn std::error::Error>> {
        Ok(UserId::new(self.config.user()?.user_id.clone()))
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.ledger.clone(),
            self.remote.clone(),
            self.identity.clone(),
        )
    }

    pub fn membership(&self) -> MembershipIndex {
        MembershipIndex::new(self.remote.clone())
    }
}
