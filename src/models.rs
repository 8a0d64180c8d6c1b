/// Data Models Module
///
/// This module defines the canonical, storage-ready record shapes used
/// throughout the application. The transform stage produces these from raw
/// JSON-RPC data; the record stores persist them as-is.
use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel written in place of a string field the chain response omitted.
pub const UNKNOWN: &str = "unknown";

/// Canonical record for one Ethereum block.
///
/// `number` is the stable identity; `transactions` is empty (never absent)
/// when the block was extracted headers-only or carried no transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRecord {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: i64,
    pub miner: String,
    pub difficulty: U256,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub transaction_count: u32,
    pub transactions: Vec<TransactionRecord>,
    pub extracted_at: DateTime<Utc>,
    pub source_tag: String,
}

/// Canonical record for one Ethereum transaction, scoped to exactly one
/// block by `block_number`.
///
/// `value_wei` and `gas_price` are authoritative; `value_ether` and
/// `gas_price_gwei` are derived decimals computed at transform time.
/// `to_address` is `None` for contract-creation transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub block_number: u64,
    pub transaction_index: u32,
    pub from_address: String,
    pub to_address: Option<String>,
    pub value_wei: U256,
    pub value_ether: f64,
    pub gas: u64,
    pub gas_price: U256,
    pub gas_price_gwei: f64,
    pub input_data: String,
    pub nonce: u64,
    pub extracted_at: DateTime<Utc>,
    pub source_tag: String,
}

impl BlockRecord {
    /// True when the record carries the full transaction objects, not just
    /// the header-level count.
    pub fn has_full_transactions(&self) -> bool {
        self.transaction_count as usize == self.transactions.len()
    }
}
