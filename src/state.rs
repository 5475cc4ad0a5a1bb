use std::sync::Arc;

use crate::clients::{PhantomClient, SubscriberDirectory, TokenCache};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, ClientService, ReceiptStorage, SeaOrmAuthService, SeaOrmClientService,
    SyncService,
};

/// Build the HTTP client used for every Phantom call.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(concat!("PhantomSales/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub clock: Arc<dyn Clock>,

    pub directory: Arc<dyn SubscriberDirectory>,

    pub auth_service: Arc<dyn AuthService>,

    pub client_service: Arc<dyn ClientService>,

    pub sync_service: Arc<SyncService>,
}

impl SharedState {
    /// Connects the database and builds the live Phantom client.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let http = build_shared_http_client(config.phantom.request_timeout_seconds)?;
        let cache = Arc::new(TokenCache::new(clock.clone()));
        let directory: Arc<dyn SubscriberDirectory> =
            Arc::new(PhantomClient::new(&config.phantom, http, cache)?);

        Ok(Self::from_parts(config, store, clock, directory))
    }

    /// Wires services over already-built infrastructure.
    #[must_use]
    pub fn from_parts(
        config: Config,
        store: Store,
        clock: Arc<dyn Clock>,
        directory: Arc<dyn SubscriberDirectory>,
    ) -> Self {
        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            clock.clone(),
            config.security.clone(),
        )) as Arc<dyn AuthService>;

        let client_service = Arc::new(SeaOrmClientService::new(
            store.clone(),
            ReceiptStorage::new(&config.storage.receipts_path),
            directory.clone(),
            clock.clone(),
            config.storage.max_receipt_bytes,
        )) as Arc<dyn ClientService>;

        let sync_service = Arc::new(SyncService::new(
            store.clone(),
            directory.clone(),
            clock.clone(),
        ));

        Self {
            config: Arc::new(config),
            store,
            clock,
            directory,
            auth_service,
            client_service,
            sync_service,
        }
    }
}
