/// Raw JSON-RPC response shapes.
///
/// Every field is optional: the transform stage is responsible for filling
/// absent fields with explicit sentinels, so nothing is rejected at the
/// wire boundary. Quantities arrive as 0x-prefixed hex strings and decode
/// into `U256`.
use alloy_primitives::U256;
use serde::Deserialize;

/// A block as returned by `eth_getBlockByNumber`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub number: Option<U256>,
    pub hash: Option<String>,
    pub parent_hash: Option<String>,
    pub timestamp: Option<U256>,
    pub miner: Option<String>,
    pub difficulty: Option<U256>,
    pub gas_limit: Option<U256>,
    pub gas_used: Option<U256>,
    #[serde(default)]
    pub transactions: BlockTransactions,
}

/// The `transactions` field of a block: hashes when the block was requested
/// headers-only, full objects otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BlockTransactions {
    Full(Vec<RawTransaction>),
    Hashes(Vec<String>),
}

impl BlockTransactions {
    pub fn len(&self) -> usize {
        match self {
            BlockTransactions::Full(txs) => txs.len(),
            BlockTransactions::Hashes(hashes) => hashes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BlockTransactions {
    fn default() -> Self {
        BlockTransactions::Hashes(Vec::new())
    }
}

/// A transaction as returned by `eth_getTransactionByHash` or embedded in a
/// full block response. `to` is null for contract creation; `gas_price` is
/// absent on some typed-transaction responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: Option<String>,
    pub block_number: Option<U256>,
    pub transaction_index: Option<U256>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<U256>,
    pub gas: Option<U256>,
    pub gas_price: Option<U256>,
    pub input: Option<String>,
    pub nonce: Option<U256>,
}
