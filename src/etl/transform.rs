/// Transform Module
///
/// Normalizes raw JSON-RPC data into canonical storage records. Pure
/// functions: no I/O, no failures. Absent fields are filled with explicit
/// sentinels and a warning, never silently omitted, and the derived decimal
/// units are computed here so the stored record is self-describing.
use alloy_primitives::U256;
use chrono::Utc;

use crate::etl::extract::ExtractedBlock;
use crate::models::{BlockRecord, TransactionRecord, UNKNOWN};
use crate::rpc::types::{BlockTransactions, RawTransaction};

const WEI_PER_ETHER: f64 = 1e18;
const WEI_PER_GWEI: f64 = 1e9;

/// Build the canonical block record from a raw block.
///
/// The requested block number is the fallback identity when the response
/// omitted its own `number` field, so a record always has a usable key.
pub fn block_record(extracted: &ExtractedBlock, source_tag: &str) -> BlockRecord {
    let raw = &extracted.raw;

    let number = match raw.number {
        Some(n) => to_u64(n),
        None => {
            tracing::warn!("block {}: missing field 'number', using requested number", extracted.number);
            extracted.number
        }
    };

    let transactions = match &raw.transactions {
        BlockTransactions::Full(txs) => txs
            .iter()
            .enumerate()
            .map(|(index, tx)| transaction_record(tx, number, index as u32, source_tag))
            .collect(),
        // Hash-only extraction: the count is still known, the bodies are not.
        BlockTransactions::Hashes(_) => Vec::new(),
    };

    BlockRecord {
        number,
        hash: string_or_unknown(&raw.hash, number, "hash"),
        parent_hash: string_or_unknown(&raw.parent_hash, number, "parent_hash"),
        timestamp: quantity_or_zero(raw.timestamp, number, "timestamp") as i64,
        miner: string_or_unknown(&raw.miner, number, "miner"),
        difficulty: u256_or_zero(raw.difficulty, number, "difficulty"),
        gas_limit: quantity_or_zero(raw.gas_limit, number, "gas_limit"),
        gas_used: quantity_or_zero(raw.gas_used, number, "gas_used"),
        transaction_count: raw.transactions.len() as u32,
        transactions,
        extracted_at: Utc::now(),
        source_tag: source_tag.to_string(),
    }
}

/// Build the canonical transaction record from a raw transaction.
///
/// `block_number` and `index` are the enclosing block's number and the
/// position within it, used as fallbacks when the response omits them.
pub fn transaction_record(
    raw: &RawTransaction,
    block_number: u64,
    index: u32,
    source_tag: &str,
) -> TransactionRecord {
    let hash = match &raw.hash {
        Some(h) => h.clone(),
        None => {
            tracing::warn!("transaction {}/{}: missing field 'hash'", block_number, index);
            UNKNOWN.to_string()
        }
    };

    let value_wei = match raw.value {
        Some(v) => v,
        None => {
            tracing::warn!("transaction {}: missing field 'value'", hash);
            U256::ZERO
        }
    };

    // Typed (EIP-1559) transactions may omit the legacy gas_price field.
    let gas_price = match raw.gas_price {
        Some(p) => p,
        None => {
            tracing::warn!("transaction {}: missing field 'gas_price'", hash);
            U256::ZERO
        }
    };

    TransactionRecord {
        block_number: match raw.block_number {
            Some(n) => to_u64(n),
            None => {
                tracing::warn!("transaction {}: missing field 'block_number'", hash);
                block_number
            }
        },
        transaction_index: match raw.transaction_index {
            Some(i) => to_u64(i) as u32,
            None => {
                tracing::warn!("transaction {}: missing field 'transaction_index'", hash);
                index
            }
        },
        from_address: match &raw.from {
            Some(from) => from.clone(),
            None => {
                tracing::warn!("transaction {}: missing field 'from'", hash);
                UNKNOWN.to_string()
            }
        },
        // Null `to` is the contract-creation marker, not a missing field.
        to_address: raw.to.clone(),
        value_ether: wei_to_ether(value_wei),
        gas: match raw.gas {
            Some(g) => to_u64(g),
            None => {
                tracing::warn!("transaction {}: missing field 'gas'", hash);
                0
            }
        },
        gas_price_gwei: wei_to_gwei(gas_price),
        input_data: match &raw.input {
            Some(input) => input.clone(),
            None => {
                tracing::warn!("transaction {}: missing field 'input'", hash);
                "0x".to_string()
            }
        },
        nonce: match raw.nonce {
            Some(n) => to_u64(n),
            None => {
                tracing::warn!("transaction {}: missing field 'nonce'", hash);
                0
            }
        },
        hash,
        value_wei,
        gas_price,
        extracted_at: Utc::now(),
        source_tag: source_tag.to_string(),
    }
}

/// Convert a wei amount to a human-readable ether value.
pub fn wei_to_ether(wei: U256) -> f64 {
    u256_to_f64(wei) / WEI_PER_ETHER
}

/// Convert a wei amount to a human-readable gwei value.
pub fn wei_to_gwei(wei: U256) -> f64 {
    u256_to_f64(wei) / WEI_PER_GWEI
}

fn u256_to_f64(value: U256) -> f64 {
    // Lossy past 2^53, which is fine for the informational decimal fields.
    value.to_string().parse::<f64>().unwrap_or(f64::MAX)
}

fn to_u64(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn string_or_unknown(value: &Option<String>, number: u64, field: &str) -> String {
    match value {
        Some(v) => v.clone(),
        None => {
            tracing::warn!("block {}: missing field '{}'", number, field);
            UNKNOWN.to_string()
        }
    }
}

fn quantity_or_zero(value: Option<U256>, number: u64, field: &str) -> u64 {
    match value {
        Some(v) => to_u64(v),
        None => {
            tracing::warn!("block {}: missing field '{}'", number, field);
            0
        }
    }
}

fn u256_or_zero(value: Option<U256>, number: u64, field: &str) -> U256 {
    value.unwrap_or_else(|| {
        tracing::warn!("block {}: missing field '{}'", number, field);
        U256::ZERO
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::types::RawBlock;

    fn raw_tx(value: u64, gas_price: u64) -> RawTransaction {
        RawTransaction {
            hash: Some("0xaa".into()),
            block_number: Some(U256::from(7u64)),
            transaction_index: Some(U256::from(3u64)),
            from: Some("0xf1".into()),
            to: Some("0xf2".into()),
            value: Some(U256::from(value)),
            gas: Some(U256::from(21_000u64)),
            gas_price: Some(U256::from(gas_price)),
            input: Some("0x".into()),
            nonce: Some(U256::from(9u64)),
        }
    }

    #[test]
    fn derives_decimal_units() {
        let record = transaction_record(&raw_tx(1_000_000_000_000_000_000, 20_000_000_000), 7, 3, "test");
        assert_eq!(record.value_ether, 1.0);
        assert_eq!(record.gas_price_gwei, 20.0);
        assert_eq!(record.value_wei, U256::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn fills_missing_transaction_fields_with_sentinels() {
        let raw = RawTransaction {
            hash: None,
            block_number: None,
            transaction_index: None,
            from: None,
            to: None,
            value: None,
            gas: None,
            gas_price: None,
            input: None,
            nonce: None,
        };
        let record = transaction_record(&raw, 42, 5, "test");
        assert_eq!(record.hash, UNKNOWN);
        assert_eq!(record.from_address, UNKNOWN);
        assert_eq!(record.block_number, 42);
        assert_eq!(record.transaction_index, 5);
        assert_eq!(record.value_wei, U256::ZERO);
        assert_eq!(record.value_ether, 0.0);
        assert_eq!(record.gas_price_gwei, 0.0);
        assert_eq!(record.input_data, "0x");
        assert_eq!(record.nonce, 0);
        assert!(record.to_address.is_none());
    }

    #[test]
    fn block_falls_back_to_requested_number() {
        let extracted = ExtractedBlock {
            number: 1234,
            raw: RawBlock {
                number: None,
                hash: None,
                parent_hash: None,
                timestamp: None,
                miner: None,
                difficulty: None,
                gas_limit: None,
                gas_used: None,
                transactions: BlockTransactions::default(),
            },
        };
        let record = block_record(&extracted, "test");
        assert_eq!(record.number, 1234);
        assert_eq!(record.hash, UNKNOWN);
        assert_eq!(record.miner, UNKNOWN);
        assert_eq!(record.transaction_count, 0);
        assert!(record.transactions.is_empty());
        assert_eq!(record.source_tag, "test");
    }

    #[test]
    fn hash_only_blocks_keep_count_without_bodies() {
        let extracted = ExtractedBlock {
            number: 10,
            raw: RawBlock {
                number: Some(U256::from(10u64)),
                hash: Some("0xbb".into()),
                parent_hash: Some("0xcc".into()),
                timestamp: Some(U256::from(1_700_000_000u64)),
                miner: Some("0xdd".into()),
                difficulty: Some(U256::ZERO),
                gas_limit: Some(U256::from(30_000_000u64)),
                gas_used: Some(U256::from(12_000_000u64)),
                transactions: BlockTransactions::Hashes(vec!["0x01".into(), "0x02".into()]),
            },
        };
        let record = block_record(&extracted, "test");
        assert_eq!(record.transaction_count, 2);
        assert!(record.transactions.is_empty());
        assert!(!record.has_full_transactions());
    }

    #[test]
    fn full_transactions_inherit_block_scope() {
        let extracted = ExtractedBlock {
            number: 7,
            raw: RawBlock {
                number: Some(U256::from(7u64)),
                hash: Some("0xbb".into()),
                parent_hash: Some("0xcc".into()),
                timestamp: Some(U256::from(1_700_000_000u64)),
                miner: Some("0xdd".into()),
                difficulty: Some(U256::from(131_072u64)),
                gas_limit: Some(U256::from(30_000_000u64)),
                gas_used: Some(U256::from(21_000u64)),
                transactions: BlockTransactions::Full(vec![raw_tx(5, 5)]),
            },
        };
        let record = block_record(&extracted, "test");
        assert_eq!(record.transaction_count, 1);
        assert_eq!(record.transactions.len(), 1);
        assert!(record.has_full_transactions());
        assert_eq!(record.transactions[0].block_number, 7);
    }
}
