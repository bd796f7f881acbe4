use crate::foyer_cache::FoyerCacheConnector;
use crate::http_peer::HttpPeerConnector;
use crate::moka_cache::MokaCacheConnector;
use crate::sled_store::SledConnector;
use async_trait::async_trait;
use recordstore::memory::MemoryConnector;
use recordstore::{CacheClient, Connector, RecordClient};
use shared::Result;
use shared::config::{CacheBackend, Config, RecordBackend};
use std::sync::Arc;
use std::time::Duration;

/// Record-store connector chosen from configuration.
#[derive(Clone, Debug)]
pub enum RecordStoreConnector {
    Memory(MemoryConnector),
    Sled(SledConnector),
    Http(HttpPeerConnector),
}

impl RecordStoreConnector {
    pub fn from_config(config: &Config) -> Self {
        match &config.records {
            RecordBackend::Memory => Self::Memory(MemoryConnector),
            RecordBackend::Sled(data_dir) => Self::Sled(SledConnector::new(
                std::path::Path::new(data_dir).join("records.sled"),
            )),
            RecordBackend::Http(url, timeout_ms) => Self::Http(HttpPeerConnector::new(
                url.clone(),
                Duration::from_millis(*timeout_ms),
            )),
        }
    }
}

#[async_trait]
impl Connector for RecordStoreConnector {
    type Client = dyn RecordClient;

    async fn connect(&self) -> Result<Arc<dyn RecordClient>> {
        let client: Arc<dyn RecordClient> = match self {
            Self::Memory(c) => c.connect().await?,
            Self::Sled(c) => c.connect().await?,
            Self::Http(c) => c.connect().await?,
        };
        Ok(client)
    }

    async fn disconnect(&self, client: &Self::Client) -> Result<()> {
        client.flush().await
    }

    fn describe(&self) -> String {
        match self {
            Self::Memory(c) => c.describe(),
            Self::Sled(c) => c.describe(),
            Self::Http(c) => c.describe(),
        }
    }
}

/// Cache connector chosen from configuration.
#[derive(Clone, Debug)]
pub enum CacheStoreConnector {
    Moka(MokaCacheConnector),
    Foyer(FoyerCacheConnector),
}

impl CacheStoreConnector {
    pub fn from_config(config: &Config, name: &str) -> Self {
        match config.cache {
            CacheBackend::Moka => Self::Moka(MokaCacheConnector {
                name: name.to_string(),
                max_entries: Some(config.cache_capacity),
                default_ttl: config.cache_default_ttl(),
            }),
            CacheBackend::Foyer => Self::Foyer(FoyerCacheConnector {
                name: name.to_string(),
                capacity: config.cache_capacity as usize,
                default_ttl: config.cache_default_ttl(),
            }),
        }
    }
}

#[async_trait]
impl Connector for CacheStoreConnector {
    type Client = dyn CacheClient;

    async fn connect(&self) -> Result<Arc<dyn CacheClient>> {
        let client: Arc<dyn CacheClient> = match self {
            Self::Moka(c) => c.connect().await?,
            Self::Foyer(c) => c.connect().await?,
        };
        Ok(client)
    }

    fn describe(&self) -> String {
        match self {
            Self::Moka(c) => c.describe(),
            Self::Foyer(c) => c.describe(),
        }
    }
}
