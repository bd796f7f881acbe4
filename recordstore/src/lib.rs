//! Generic record-store layer: a typed CRUD repository and a cache-aside
//! cache, both driven through lazily acquired backend clients and both
//! reporting failure through `shared::Result`.

pub mod cache;
pub mod domain;
pub mod factory;
pub mod filter;
pub mod memory;
pub mod patch;
pub mod ports;
pub mod record;
pub mod repository;
pub mod services;

pub use cache::StandardCache;
pub use factory::ClientFactory;
pub use filter::RecordFilter;
pub use patch::Patch;
pub use ports::{CacheClient, Connector, Document, MergeGuard, RecordClient};
pub use record::{Record, RecordKey};
pub use repository::{
    Action, CreateRecordRequest, DeleteRecordRequest, GetAllRecordsRequest, GetRecordRequest,
    RepositoryContext, StandardRepository, UpdateRecordRequest,
};
pub use shared::{Error, ErrorKind, Result};
