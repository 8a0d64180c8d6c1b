/// In-memory record store used as a test double for the pipeline and the
/// load stage. Mirrors the production upsert-by-key semantics.
use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::{RecordStore, StoreError};
use crate::models::{BlockRecord, TransactionRecord};

#[derive(Default)]
pub struct MemoryStore {
    blocks: Mutex<BTreeMap<u64, BlockRecord>>,
    transactions: Mutex<BTreeMap<String, TransactionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn store_block(&self, block: &BlockRecord) -> Result<(), StoreError> {
        self.blocks.lock().unwrap().insert(block.number, block.clone());
        Ok(())
    }

    async fn store_transaction(&self, tx: &TransactionRecord) -> Result<(), StoreError> {
        self.transactions.lock().unwrap().insert(tx.hash.clone(), tx.clone());
        Ok(())
    }

    async fn get_block(&self, number: u64) -> Result<Option<BlockRecord>, StoreError> {
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.transactions.lock().unwrap().get(hash).cloned())
    }

    async fn get_blocks_in_range(&self, from: u64, to: u64) -> Result<Vec<BlockRecord>, StoreError> {
        Ok(self.blocks.lock().unwrap().range(from..=to).map(|(_, b)| b.clone()).collect())
    }

    async fn count_blocks(&self) -> Result<u64, StoreError> {
        Ok(self.blocks.lock().unwrap().len() as u64)
    }

    async fn count_transactions(&self) -> Result<u64, StoreError> {
        Ok(self.transactions.lock().unwrap().len() as u64)
    }

    async fn latest_stored_block(&self) -> Result<Option<BlockRecord>, StoreError> {
        Ok(self.blocks.lock().unwrap().last_key_value().map(|(_, b)| b.clone()))
    }

    async fn close(&self) {}
}
