/// MongoDB record store.
///
/// Document layout: the block document embeds its transactions array, and
/// each transaction is additionally stored as an individual document for
/// hash lookups. Writes are `replace_one` upserts keyed on block number /
/// transaction hash.
use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOneOptions, FindOptions, ReplaceOptions};
use mongodb::{Client, Collection, IndexModel};

use crate::db::{RecordStore, StoreError};
use crate::models::{BlockRecord, TransactionRecord, UNKNOWN};

pub struct MongoStore {
    client: Client,
    blocks: Collection<Document>,
    transactions: Collection<Document>,
}

impl MongoStore {
    /// Connect, ping the server, and create the lookup indexes.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;
        let db = client.database(database);

        db.run_command(doc! { "ping": 1 }, None).await?;

        let blocks = db.collection::<Document>("blocks");
        let transactions = db.collection::<Document>("transactions");

        blocks
            .create_index(IndexModel::builder().keys(doc! { "block_number": 1 }).build(), None)
            .await?;
        transactions
            .create_index(IndexModel::builder().keys(doc! { "tx_hash": 1 }).build(), None)
            .await?;
        transactions
            .create_index(IndexModel::builder().keys(doc! { "block_number": 1 }).build(), None)
            .await?;

        tracing::info!("mongodb connection established and indexes created");
        Ok(Self { client, blocks, transactions })
    }
}

fn transaction_to_doc(tx: &TransactionRecord) -> Document {
    doc! {
        "tx_hash": tx.hash.clone(),
        "block_number": tx.block_number as i64,
        "transaction_index": tx.transaction_index as i64,
        "from_address": tx.from_address.clone(),
        "to_address": match &tx.to_address {
            Some(to) => Bson::String(to.clone()),
            None => Bson::Null,
        },
        "value_wei": tx.value_wei.to_string(),
        "value_ether": tx.value_ether,
        "gas": tx.gas as i64,
        "gas_price": tx.gas_price.to_string(),
        "gas_price_gwei": tx.gas_price_gwei,
        "input_data": tx.input_data.clone(),
        "nonce": tx.nonce as i64,
        "extracted_at": tx.extracted_at.to_rfc3339(),
        "source_tag": tx.source_tag.clone(),
        "created_at": mongodb::bson::DateTime::now(),
    }
}

fn block_to_doc(block: &BlockRecord) -> Document {
    let transactions: Vec<Bson> =
        block.transactions.iter().map(|tx| Bson::Document(transaction_to_doc(tx))).collect();

    doc! {
        "block_number": block.number as i64,
        "block_hash": block.hash.clone(),
        "parent_hash": block.parent_hash.clone(),
        "timestamp": block.timestamp,
        "miner": block.miner.clone(),
        "difficulty": block.difficulty.to_string(),
        "gas_limit": block.gas_limit as i64,
        "gas_used": block.gas_used as i64,
        "transaction_count": block.transaction_count as i64,
        "transactions": transactions,
        "extracted_at": block.extracted_at.to_rfc3339(),
        "source_tag": block.source_tag.clone(),
        "created_at": mongodb::bson::DateTime::now(),
    }
}

fn doc_to_transaction(doc: &Document) -> TransactionRecord {
    TransactionRecord {
        hash: doc.get_str("tx_hash").unwrap_or(UNKNOWN).to_string(),
        block_number: doc.get_i64("block_number").unwrap_or_default() as u64,
        transaction_index: doc.get_i64("transaction_index").unwrap_or_default() as u32,
        from_address: doc.get_str("from_address").unwrap_or(UNKNOWN).to_string(),
        to_address: doc.get_str("to_address").ok().map(str::to_string),
        value_wei: parse_numeric(doc.get_str("value_wei").unwrap_or("0")),
        value_ether: doc.get_f64("value_ether").unwrap_or_default(),
        gas: doc.get_i64("gas").unwrap_or_default() as u64,
        gas_price: parse_numeric(doc.get_str("gas_price").unwrap_or("0")),
        gas_price_gwei: doc.get_f64("gas_price_gwei").unwrap_or_default(),
        input_data: doc.get_str("input_data").unwrap_or("0x").to_string(),
        nonce: doc.get_i64("nonce").unwrap_or_default() as u64,
        extracted_at: parse_timestamp(doc.get_str("extracted_at").unwrap_or_default()),
        source_tag: doc.get_str("source_tag").unwrap_or_default().to_string(),
    }
}

fn doc_to_block(doc: &Document) -> BlockRecord {
    let transactions = doc
        .get_array("transactions")
        .map(|array| {
            array.iter().filter_map(Bson::as_document).map(doc_to_transaction).collect()
        })
        .unwrap_or_default();

    BlockRecord {
        number: doc.get_i64("block_number").unwrap_or_default() as u64,
        hash: doc.get_str("block_hash").unwrap_or(UNKNOWN).to_string(),
        parent_hash: doc.get_str("parent_hash").unwrap_or(UNKNOWN).to_string(),
        timestamp: doc.get_i64("timestamp").unwrap_or_default(),
        miner: doc.get_str("miner").unwrap_or(UNKNOWN).to_string(),
        difficulty: parse_numeric(doc.get_str("difficulty").unwrap_or("0")),
        gas_limit: doc.get_i64("gas_limit").unwrap_or_default() as u64,
        gas_used: doc.get_i64("gas_used").unwrap_or_default() as u64,
        transaction_count: doc.get_i64("transaction_count").unwrap_or_default() as u32,
        transactions,
        extracted_at: parse_timestamp(doc.get_str("extracted_at").unwrap_or_default()),
        source_tag: doc.get_str("source_tag").unwrap_or_default().to_string(),
    }
}

fn parse_numeric(text: &str) -> U256 {
    text.parse::<U256>().unwrap_or(U256::ZERO)
}

fn parse_timestamp(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl RecordStore for MongoStore {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn store_block(&self, block: &BlockRecord) -> Result<(), StoreError> {
        self.blocks
            .replace_one(
                doc! { "block_number": block.number as i64 },
                block_to_doc(block),
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;

        tracing::debug!("stored block {} in mongodb", block.number);
        Ok(())
    }

    async fn store_transaction(&self, tx: &TransactionRecord) -> Result<(), StoreError> {
        self.transactions
            .replace_one(
                doc! { "tx_hash": tx.hash.clone() },
                transaction_to_doc(tx),
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;

        Ok(())
    }

    async fn get_block(&self, number: u64) -> Result<Option<BlockRecord>, StoreError> {
        let doc = self.blocks.find_one(doc! { "block_number": number as i64 }, None).await?;
        Ok(doc.map(|d| doc_to_block(&d)))
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<TransactionRecord>, StoreError> {
        let doc = self.transactions.find_one(doc! { "tx_hash": hash }, None).await?;
        Ok(doc.map(|d| doc_to_transaction(&d)))
    }

    async fn get_blocks_in_range(&self, from: u64, to: u64) -> Result<Vec<BlockRecord>, StoreError> {
        let filter = doc! { "block_number": { "$gte": from as i64, "$lte": to as i64 } };
        let options = FindOptions::builder().sort(doc! { "block_number": 1 }).build();

        let mut cursor = self.blocks.find(filter, options).await?;
        let mut blocks = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            blocks.push(doc_to_block(&doc));
        }

        Ok(blocks)
    }

    async fn count_blocks(&self) -> Result<u64, StoreError> {
        Ok(self.blocks.count_documents(None, None).await?)
    }

    async fn count_transactions(&self) -> Result<u64, StoreError> {
        Ok(self.transactions.count_documents(None, None).await?)
    }

    async fn latest_stored_block(&self) -> Result<Option<BlockRecord>, StoreError> {
        let options = FindOneOptions::builder().sort(doc! { "block_number": -1 }).build();
        let doc = self.blocks.find_one(None, options).await?;
        Ok(doc.map(|d| doc_to_block(&d)))
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        tracing::info!("mongodb client shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use chrono::Utc;

    fn sample_block() -> BlockRecord {
        BlockRecord {
            number: 100,
            hash: "0xaa".into(),
            parent_hash: "0xbb".into(),
            timestamp: 1_700_000_000,
            miner: "0xcc".into(),
            difficulty: U256::from(131_072u64),
            gas_limit: 30_000_000,
            gas_used: 21_000,
            transaction_count: 1,
            transactions: vec![TransactionRecord {
                hash: "0x01".into(),
                block_number: 100,
                transaction_index: 0,
                from_address: "0xf1".into(),
                to_address: None,
                value_wei: U256::from(5u64),
                value_ether: 5e-18,
                gas: 21_000,
                gas_price: U256::from(1_000_000_000u64),
                gas_price_gwei: 1.0,
                input_data: "0x".into(),
                nonce: 1,
                extracted_at: Utc::now(),
                source_tag: "test".into(),
            }],
            extracted_at: Utc::now(),
            source_tag: "test".into(),
        }
    }

    #[test]
    fn block_document_round_trips() {
        let block = sample_block();
        let restored = doc_to_block(&block_to_doc(&block));

        assert_eq!(restored.number, block.number);
        assert_eq!(restored.hash, block.hash);
        assert_eq!(restored.difficulty, block.difficulty);
        assert_eq!(restored.transaction_count, 1);
        assert_eq!(restored.transactions.len(), 1);
        assert_eq!(restored.transactions[0].hash, "0x01");
        // Contract creation survives as an explicit null.
        assert!(restored.transactions[0].to_address.is_none());
        assert_eq!(restored.transactions[0].value_wei, U256::from(5u64));
    }

    #[test]
    fn empty_transaction_list_stays_empty_not_absent() {
        let mut block = sample_block();
        block.transactions.clear();
        block.transaction_count = 0;

        let doc = block_to_doc(&block);
        assert!(doc.get_array("transactions").unwrap().is_empty());

        let restored = doc_to_block(&doc);
        assert!(restored.transactions.is_empty());
        assert_eq!(restored.transaction_count, 0);
    }
}
