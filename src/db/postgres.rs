/// PostgreSQL record store.
///
/// Relational layout: blocks and transactions live in separate tables and
/// the block row does not embed its transaction list. Writes are upserts
/// (`ON CONFLICT ... DO UPDATE`) keyed on block number / transaction hash.
use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use crate::db::{RecordStore, StoreError};
use crate::models::{BlockRecord, TransactionRecord};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect, verify the connection, and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(database_url).await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("postgres connection established and migrations applied");
        Ok(Self { pool })
    }

    /// Access to the underlying pool, mainly for tests against a live
    /// database.
    #[allow(dead_code)]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct BlockRow {
    block_number: i64,
    block_hash: String,
    parent_hash: String,
    timestamp: i64,
    miner: String,
    difficulty: String,
    gas_limit: i64,
    gas_used: i64,
    transaction_count: i32,
    extracted_at: String,
    source_tag: String,
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    tx_hash: String,
    block_number: i64,
    transaction_index: i32,
    from_address: String,
    to_address: Option<String>,
    value_wei: String,
    value_ether: f64,
    gas: i64,
    gas_price: String,
    gas_price_gwei: f64,
    input_data: Option<String>,
    nonce: i64,
    extracted_at: String,
    source_tag: String,
}

const SELECT_BLOCK: &str = "SELECT block_number, block_hash, parent_hash, timestamp, miner, \
     difficulty::text AS difficulty, gas_limit, gas_used, transaction_count, \
     extracted_at, source_tag FROM blocks";

const SELECT_TRANSACTION: &str = "SELECT tx_hash, block_number, transaction_index, from_address, to_address, \
     value_wei::text AS value_wei, value_ether, gas, gas_price::text AS gas_price, \
     gas_price_gwei, input_data, nonce, extracted_at, source_tag FROM transactions";

impl From<BlockRow> for BlockRecord {
    fn from(row: BlockRow) -> Self {
        BlockRecord {
            number: row.block_number as u64,
            hash: row.block_hash,
            parent_hash: row.parent_hash,
            timestamp: row.timestamp,
            miner: row.miner,
            difficulty: parse_numeric(&row.difficulty),
            gas_limit: row.gas_limit as u64,
            gas_used: row.gas_used as u64,
            transaction_count: row.transaction_count as u32,
            // The relational row never embeds the transaction list.
            transactions: Vec::new(),
            extracted_at: parse_timestamp(&row.extracted_at),
            source_tag: row.source_tag,
        }
    }
}

impl From<TransactionRow> for TransactionRecord {
    fn from(row: TransactionRow) -> Self {
        TransactionRecord {
            hash: row.tx_hash,
            block_number: row.block_number as u64,
            transaction_index: row.transaction_index as u32,
            from_address: row.from_address,
            to_address: row.to_address,
            value_wei: parse_numeric(&row.value_wei),
            value_ether: row.value_ether,
            gas: row.gas as u64,
            gas_price: parse_numeric(&row.gas_price),
            gas_price_gwei: row.gas_price_gwei,
            input_data: row.input_data.unwrap_or_else(|| "0x".to_string()),
            nonce: row.nonce as u64,
            extracted_at: parse_timestamp(&row.extracted_at),
            source_tag: row.source_tag,
        }
    }
}

fn parse_numeric(text: &str) -> U256 {
    text.parse::<U256>().unwrap_or_else(|_| {
        tracing::warn!("unparseable numeric column value: {}", text);
        U256::ZERO
    })
}

fn parse_timestamp(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| {
        tracing::warn!("unparseable extracted_at value: {}", text);
        Utc::now()
    })
}

#[async_trait]
impl RecordStore for PostgresStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn store_block(&self, block: &BlockRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO blocks (
                block_number, block_hash, parent_hash, timestamp, miner,
                difficulty, gas_limit, gas_used, transaction_count,
                extracted_at, source_tag
            )
            VALUES ($1, $2, $3, $4, $5, $6::numeric, $7, $8, $9, $10, $11)
            ON CONFLICT (block_number)
            DO UPDATE SET
                block_hash = EXCLUDED.block_hash,
                parent_hash = EXCLUDED.parent_hash,
                timestamp = EXCLUDED.timestamp,
                miner = EXCLUDED.miner,
                difficulty = EXCLUDED.difficulty,
                gas_limit = EXCLUDED.gas_limit,
                gas_used = EXCLUDED.gas_used,
                transaction_count = EXCLUDED.transaction_count,
                extracted_at = EXCLUDED.extracted_at,
                source_tag = EXCLUDED.source_tag,
                created_at = NOW()
            "#,
        )
        .bind(block.number as i64)
        .bind(&block.hash)
        .bind(&block.parent_hash)
        .bind(block.timestamp)
        .bind(&block.miner)
        .bind(block.difficulty.to_string())
        .bind(block.gas_limit as i64)
        .bind(block.gas_used as i64)
        .bind(block.transaction_count as i32)
        .bind(block.extracted_at.to_rfc3339())
        .bind(&block.source_tag)
        .execute(&self.pool)
        .await?;

        tracing::debug!("stored block {} in postgres", block.number);
        Ok(())
    }

    async fn store_transaction(&self, tx: &TransactionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                tx_hash, block_number, transaction_index, from_address, to_address,
                value_wei, value_ether, gas, gas_price, gas_price_gwei,
                input_data, nonce, extracted_at, source_tag
            )
            VALUES ($1, $2, $3, $4, $5, $6::numeric, $7, $8, $9::numeric, $10, $11, $12, $13, $14)
            ON CONFLICT (tx_hash)
            DO UPDATE SET
                block_number = EXCLUDED.block_number,
                transaction_index = EXCLUDED.transaction_index,
                from_address = EXCLUDED.from_address,
                to_address = EXCLUDED.to_address,
                value_wei = EXCLUDED.value_wei,
                value_ether = EXCLUDED.value_ether,
                gas = EXCLUDED.gas,
                gas_price = EXCLUDED.gas_price,
                gas_price_gwei = EXCLUDED.gas_price_gwei,
                input_data = EXCLUDED.input_data,
                nonce = EXCLUDED.nonce,
                extracted_at = EXCLUDED.extracted_at,
                source_tag = EXCLUDED.source_tag,
                created_at = NOW()
            "#,
        )
        .bind(&tx.hash)
        .bind(tx.block_number as i64)
        .bind(tx.transaction_index as i32)
        .bind(&tx.from_address)
        .bind(&tx.to_address)
        .bind(tx.value_wei.to_string())
        .bind(tx.value_ether)
        .bind(tx.gas as i64)
        .bind(tx.gas_price.to_string())
        .bind(tx.gas_price_gwei)
        .bind(&tx.input_data)
        .bind(tx.nonce as i64)
        .bind(tx.extracted_at.to_rfc3339())
        .bind(&tx.source_tag)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_block(&self, number: u64) -> Result<Option<BlockRecord>, StoreError> {
        let row = sqlx::query_as::<_, BlockRow>(&format!("{SELECT_BLOCK} WHERE block_number = $1"))
            .bind(number as i64)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(BlockRecord::from))
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<TransactionRecord>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!("{SELECT_TRANSACTION} WHERE tx_hash = $1"))
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TransactionRecord::from))
    }

    async fn get_blocks_in_range(&self, from: u64, to: u64) -> Result<Vec<BlockRecord>, StoreError> {
        let rows = sqlx::query_as::<_, BlockRow>(&format!(
            "{SELECT_BLOCK} WHERE block_number >= $1 AND block_number <= $2 ORDER BY block_number ASC"
        ))
        .bind(from as i64)
        .bind(to as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(BlockRecord::from).collect())
    }

    async fn count_blocks(&self) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM blocks").fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn count_transactions(&self) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions").fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn latest_stored_block(&self) -> Result<Option<BlockRecord>, StoreError> {
        let row = sqlx::query_as::<_, BlockRow>(&format!(
            "{SELECT_BLOCK} ORDER BY block_number DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(BlockRecord::from))
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("postgres connection pool closed");
    }
}
