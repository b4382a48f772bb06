use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use metrix_core::error::{MetrixError, Result};
use metrix_core::signer::SigningConfig;

use crate::policy::TrustedSubnet;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub signing: SigningConfig,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetrixError::BadRequest(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.server.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// CIDR; requests whose `X-Real-IP` falls outside it are rejected.
    #[serde(default)]
    pub trusted_subnet: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            trusted_subnet: None,
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen.parse::<SocketAddr>().map_err(|e| {
            MetrixError::BadRequest(format!("server.listen {:?} is not a socket address: {e}", self.listen))
        })?;
        if let Some(cidr) = &self.trusted_subnet {
            TrustedSubnet::parse(cidr)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// `0` mirrors every write to the backup synchronously.
    #[serde(default = "default_store_interval_secs")]
    pub store_interval_secs: u64,

    #[serde(default)]
    pub file_storage_path: Option<String>,

    /// SQLite DSN; wins over `file_storage_path` when both are set.
    #[serde(default)]
    pub database_dsn: Option<String>,

    #[serde(default = "default_restore")]
    pub restore: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            store_interval_secs: default_store_interval_secs(),
            file_storage_path: None,
            database_dsn: None,
            restore: default_restore(),
        }
    }
}

impl StorageSection {
    pub fn validate(&self) -> Result<()> {
        if self.store_interval_secs > 86400 {
            return Err(MetrixError::BadRequest(
                "storage.store_interval_secs must be between 0 and 86400".into(),
            ));
        }
        if matches!(self.database_dsn.as_deref(), Some(d) if d.trim().is_empty()) {
            return Err(MetrixError::BadRequest(
                "storage.database_dsn must not be empty".into(),
            ));
        }
        if matches!(self.file_storage_path.as_deref(), Some(p) if p.trim().is_empty()) {
            return Err(MetrixError::BadRequest(
                "storage.file_storage_path must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn store_interval(&self) -> Duration {
        Duration::from_secs(self.store_interval_secs)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_store_interval_secs() -> u64 {
    300
}
fn default_restore() -> bool {
    true
}
