//! Concrete backends for the recordstore ports: sled and HTTP-peer record
//! clients, moka and foyer cache clients, and config-driven connectors that
//! pick between them.

pub mod foyer_cache;
pub mod http_peer;
pub mod moka_cache;
pub mod sled_store;
pub mod unified;

pub use foyer_cache::{FoyerCacheClient, FoyerCacheConnector};
pub use http_peer::{HttpPeerConnector, HttpRecordClient};
pub use moka_cache::{MokaCacheClient, MokaCacheConnector};
pub use sled_store::{SledConnector, SledRecordClient};
pub use unified::{CacheStoreConnector, RecordStoreConnector};
