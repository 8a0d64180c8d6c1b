/// Extract Module
///
/// Handles fetching block and transaction data from the chain via the
/// `ChainReader`. Per-block failures are skips, never aborts: a range
/// extraction always runs to the end of the range and reports what it got.
use std::time::Duration;

use tokio::time::sleep;

use crate::rpc::types::RawBlock;
use crate::rpc::{ChainReader, RpcError};

/// A raw block paired with the number it was requested under, so the
/// transform stage has a usable identity even for degenerate responses.
#[derive(Debug, Clone)]
pub struct ExtractedBlock {
    pub number: u64,
    pub raw: RawBlock,
}

/// Statistics for a range extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionStats {
    pub blocks_fetched: u64,
    pub blocks_missing: u64,
    pub blocks_failed: u64,
    pub total_transactions: u64,
}

/// Extract a single block with full transactions.
pub async fn extract_block(
    reader: &dyn ChainReader,
    number: u64,
) -> Result<Option<RawBlock>, RpcError> {
    reader.get_block(number, true).await
}

/// Extract every block in `[from, to]` inclusive, ascending, with a fixed
/// delay between chain reads to stay under provider request quotas.
///
/// Not-found and transport errors are logged per block and the range
/// continues with the next number.
pub async fn extract_block_range(
    reader: &dyn ChainReader,
    from: u64,
    to: u64,
    rate_limit: Duration,
) -> (Vec<ExtractedBlock>, ExtractionStats) {
    let mut blocks = Vec::new();
    let mut stats = ExtractionStats::default();

    if from > to {
        tracing::warn!("extraction range {}..{} is empty", from, to);
        return (blocks, stats);
    }

    tracing::info!("extracting blocks {} to {}", from, to);

    for number in from..=to {
        match extract_block(reader, number).await {
            Ok(Some(raw)) => {
                stats.blocks_fetched += 1;
                stats.total_transactions += raw.transactions.len() as u64;
                blocks.push(ExtractedBlock { number, raw });
                tracing::debug!("extracted block {}", number);
            }
            Ok(None) => {
                stats.blocks_missing += 1;
                tracing::warn!("block {} not found, skipping", number);
            }
            Err(e) => {
                stats.blocks_failed += 1;
                tracing::error!("error extracting block {}: {}", number, e);
            }
        }

        let done = number - from + 1;
        if done % 10 == 0 {
            tracing::info!("extraction progress: {}/{} blocks", done, to - from + 1);
        }

        // Rate limiting (skip after the last block).
        if number < to && !rate_limit.is_zero() {
            sleep(rate_limit).await;
        }
    }

    tracing::info!(
        "extracted {} blocks ({} missing, {} failed, {} transactions)",
        stats.blocks_fetched,
        stats.blocks_missing,
        stats.blocks_failed,
        stats.total_transactions
    );

    (blocks, stats)
}
