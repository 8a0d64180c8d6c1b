/// Database Module
///
/// Defines the record-store contract consumed by the load stage and the
/// concrete backends that implement it. The pipeline never talks to a
/// specific database: it iterates over an injected list of `RecordStore`
/// trait objects, so backends fail (and succeed) independently.
pub mod mongo;
pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::models::{BlockRecord, TransactionRecord};

/// Errors from a record store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("postgres migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable keyed storage for block and transaction records.
///
/// Writes are upserts keyed on the block number / transaction hash, so
/// re-extraction of an already-stored range is idempotent at the store
/// level. Reads return `Ok(None)` for absent keys.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name used in logs and status output.
    fn name(&self) -> &'static str;

    async fn store_block(&self, block: &BlockRecord) -> Result<(), StoreError>;

    async fn store_transaction(&self, tx: &TransactionRecord) -> Result<(), StoreError>;

    async fn get_block(&self, number: u64) -> Result<Option<BlockRecord>, StoreError>;

    async fn get_transaction(&self, hash: &str) -> Result<Option<TransactionRecord>, StoreError>;

    /// Blocks with numbers in `[from, to]` inclusive, ascending by number.
    async fn get_blocks_in_range(&self, from: u64, to: u64) -> Result<Vec<BlockRecord>, StoreError>;

    async fn count_blocks(&self) -> Result<u64, StoreError>;

    async fn count_transactions(&self) -> Result<u64, StoreError>;

    /// The stored block with the highest number, if any.
    async fn latest_stored_block(&self) -> Result<Option<BlockRecord>, StoreError>;

    /// Release the backend's connections. Called once at shutdown.
    async fn close(&self);
}
