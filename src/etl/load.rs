/// Load Module
///
/// Persists transformed records into every configured record store. The
/// loader owns an injected list of `RecordStore` implementations and fans
/// each write out to all of them; one backend failing never blocks the
/// others, and the aggregate boolean result is the AND of every attempted
/// write so partial loads stay visible to the caller.
use crate::db::{RecordStore, StoreError};
use crate::models::{BlockRecord, TransactionRecord};

pub struct Loader {
    stores: Vec<Box<dyn RecordStore>>,
}

impl Loader {
    /// Build a loader over the configured stores. At least one store is
    /// required; running without any is a configuration error.
    pub fn new(stores: Vec<Box<dyn RecordStore>>) -> Result<Self, StoreError> {
        if stores.is_empty() {
            return Err(StoreError::Unavailable("no record store configured".into()));
        }
        Ok(Self { stores })
    }

    pub fn stores(&self) -> &[Box<dyn RecordStore>] {
        &self.stores
    }

    /// Store a block in every configured store. True only if every write
    /// succeeded.
    pub async fn store_block(&self, block: &BlockRecord) -> bool {
        let mut all_ok = true;
        for store in &self.stores {
            if let Err(e) = store.store_block(block).await {
                tracing::error!("error storing block {} in {}: {}", block.number, store.name(), e);
                all_ok = false;
            }
        }
        all_ok
    }

    /// Store a transaction in every configured store. True only if every
    /// write succeeded.
    pub async fn store_transaction(&self, tx: &TransactionRecord) -> bool {
        let mut all_ok = true;
        for store in &self.stores {
            if let Err(e) = store.store_transaction(tx).await {
                tracing::error!("error storing transaction {} in {}: {}", tx.hash, store.name(), e);
                all_ok = false;
            }
        }
        all_ok
    }

    /// Store a block and then each of its transactions individually.
    ///
    /// A transaction failure is recorded but does not abort the remaining
    /// transactions, so a re-run only has the genuinely missing writes left
    /// to redo. Returns true only if the block write and every transaction
    /// write succeeded in every store.
    pub async fn store_block_with_transactions(&self, block: &BlockRecord) -> bool {
        let mut all_ok = self.store_block(block).await;

        for tx in &block.transactions {
            if !self.store_transaction(tx).await {
                all_ok = false;
            }
        }

        all_ok
    }

    /// Fetch a block from the first store that has it. Store errors are
    /// logged and the next store is consulted.
    pub async fn get_block(&self, number: u64) -> Option<BlockRecord> {
        for store in &self.stores {
            match store.get_block(number).await {
                Ok(Some(block)) => return Some(block),
                Ok(None) => {}
                Err(e) => tracing::error!("error reading block {} from {}: {}", number, store.name(), e),
            }
        }
        None
    }

    /// Fetch a transaction from the first store that has it.
    pub async fn get_transaction(&self, hash: &str) -> Option<TransactionRecord> {
        for store in &self.stores {
            match store.get_transaction(hash).await {
                Ok(Some(tx)) => return Some(tx),
                Ok(None) => {}
                Err(e) => tracing::error!("error reading transaction {} from {}: {}", hash, store.name(), e),
            }
        }
        None
    }

    /// The highest block number stored in any configured store. This is the
    /// checkpoint derivation rule used at pipeline startup.
    pub async fn latest_stored_block_number(&self) -> Option<u64> {
        let mut latest = None;
        for store in &self.stores {
            match store.latest_stored_block().await {
                Ok(Some(block)) => latest = Some(latest.map_or(block.number, |n: u64| n.max(block.number))),
                Ok(None) => {}
                Err(e) => tracing::error!("error reading latest block from {}: {}", store.name(), e),
            }
        }
        latest
    }

    /// Release every store's connections.
    pub async fn close(&self) {
        for store in &self.stores {
            store.close().await;
        }
        tracing::info!("record stores closed");
    }
}
