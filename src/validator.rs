// =============================================================================
// Ticker Validator — keep tickers with price history in the window
// =============================================================================
//
// Tickers are checked in consecutive batches, one joint price request each.
// A batch is an independent unit of work: its failure is logged and its
// tickers are dropped, while results of earlier and later batches stand.
// There is no retry.
// =============================================================================

use tracing::{debug, info, warn};

use crate::market_data::PriceSource;
use crate::types::{DateWindow, PriceFrame};

/// Tickers per request when the caller does not say otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Return the tickers that have a non-empty adjusted-close history in
/// `window`, in batch order.
///
/// A `batch_size` of zero is treated as one.
pub async fn validate_tickers<S: PriceSource>(
    source: &S,
    tickers: &[String],
    window: &DateWindow,
    batch_size: usize,
) -> Vec<String> {
    let batch_size = batch_size.max(1);
    let total_batches = tickers.len().div_ceil(batch_size);
    let mut valid = Vec::new();
    let mut failed_batches = 0usize;

    for (idx, batch) in tickers.chunks(batch_size).enumerate() {
        let frame = match source.adjusted_close(batch, window).await {
            Ok(frame) => frame,
            Err(e) => {
                failed_batches += 1;
                let reason = format!("{e:#}");
                warn!(
                    batch = idx + 1,
                    total_batches,
                    first = %batch[0],
                    error = %reason,
                    "error processing batch, skipping"
                );
                continue;
            }
        };

        let before = valid.len();
        collect_valid(batch, &frame, &mut valid);
        debug!(
            batch = idx + 1,
            total_batches,
            size = batch.len(),
            accepted = valid.len() - before,
            "batch validated"
        );
    }

    info!(
        checked = tickers.len(),
        valid = valid.len(),
        failed_batches,
        "ticker validation finished"
    );
    valid
}

/// Append the tickers of `batch` that `frame` holds data for.
fn collect_valid(batch: &[String], frame: &PriceFrame, valid: &mut Vec<String>) {
    if let [only] = batch {
        // A lone ticker owns the whole response.
        if !frame.is_empty() {
            valid.push(only.clone());
        }
        return;
    }

    for ticker in batch {
        match frame.column(ticker) {
            Some(cells) if cells.iter().any(Option::is_some) => valid.push(ticker.clone()),
            _ => {}
        }
    }
}
