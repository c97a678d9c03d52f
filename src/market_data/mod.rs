// =============================================================================
// Market Data — adjusted-close history over a date window
// =============================================================================
//
// `PriceSource` is the seam between the pipeline and the data provider.  A
// request names several tickers at once and answers with a single
// `PriceFrame`; tickers the provider knows nothing about are simply absent.
// An `Err` means the whole request failed.

pub mod yahoo;

use anyhow::Result;

use crate::types::{DateWindow, PriceFrame};

pub use yahoo::YahooChartClient;

/// Provider of daily adjusted-close prices.
pub trait PriceSource {
    async fn adjusted_close(&self, symbols: &[String], window: &DateWindow) -> Result<PriceFrame>;
}
