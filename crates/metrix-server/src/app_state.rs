//! Shared application state for the metrix server.

use std::sync::Arc;

use tracing::info;

use metrix_core::error::Result;
use metrix_core::protocol::Converter;

use crate::config::ServerConfig;
use crate::policy::TrustedSubnet;
use crate::services::MetricsService;
use crate::storage::{DatabaseStorage, DualWriteStorage, FileStorage, MetricsStorage, SyncMode};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServerConfig,
    storage: Arc<DualWriteStorage>,
    service: MetricsService,
    trusted_subnet: Option<TrustedSubnet>,
}

impl AppState {
    /// Open the configured backup store and wire the service on top of it.
    /// The database wins over the file when both are configured.
    pub async fn build(cfg: ServerConfig) -> Result<Self> {
        let backup: Arc<dyn MetricsStorage> = match (&cfg.storage.database_dsn, &cfg.storage.file_storage_path) {
            (Some(dsn), _) => {
                info!("using database backup");
                Arc::new(DatabaseStorage::connect(dsn).await?)
            }
            (None, Some(path)) => {
                info!(path = %path, "using file backup");
                Arc::new(FileStorage::new(path))
            }
            (None, None) => {
                info!("no backup configured; metrics live in memory only");
                Arc::new(FileStorage::disabled())
            }
        };
        Self::with_backup(cfg, backup)
    }

    /// Same as [`build`](Self::build) with an already opened backup store.
    pub fn with_backup(cfg: ServerConfig, backup: Arc<dyn MetricsStorage>) -> Result<Self> {
        let trusted_subnet = cfg
            .server
            .trusted_subnet
            .as_deref()
            .map(TrustedSubnet::parse)
            .transpose()?;

        let mode = SyncMode::from_interval(cfg.storage.store_interval_secs);
        let storage = Arc::new(DualWriteStorage::new(backup, mode));
        let service = MetricsService::new(storage.clone(), Converter::new(cfg.signing.signer()));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                storage,
                service,
                trusted_subnet,
            }),
        })
    }

    pub fn cfg(&self) -> &ServerConfig {
        &self.inner.cfg
    }

    pub fn storage(&self) -> &Arc<DualWriteStorage> {
        &self.inner.storage
    }

    pub fn service(&self) -> &MetricsService {
        &self.inner.service
    }

    pub fn trusted_subnet(&self) -> Option<TrustedSubnet> {
        self.inner.trusted_subnet
    }
}
