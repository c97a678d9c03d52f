// =============================================================================
// Pipeline — constituents → validation → returns
// =============================================================================
//
// Strictly linear.  Two fail-fast checks stop the run early: an empty
// constituent list and an empty validated list.  Each stop is reported and
// skips every downstream stage, including further network calls.
// =============================================================================

use tracing::{error, info};

use crate::constituents::ConstituentSource;
use crate::market_data::PriceSource;
use crate::returns::build_return_matrix;
use crate::types::{DateWindow, ReturnMatrix};
use crate::validator::validate_tickers;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The constituent list came back empty.
    NoConstituents,
    /// No ticker had price history in the window.
    NoValidTickers,
    /// The bulk download or return computation failed.
    NoReturns,
    /// A return matrix ready to render.
    Ready(ReturnMatrix),
}

/// Run every stage up to, but not including, rendering.
pub async fn run<C, S>(
    constituents: &C,
    prices: &S,
    window: &DateWindow,
    batch_size: usize,
) -> RunOutcome
where
    C: ConstituentSource,
    S: PriceSource,
{
    info!("Fetching S&P 500 tickers...");
    let tickers = constituents.constituents().await;
    if tickers.is_empty() {
        error!("Failed to fetch S&P 500 tickers.");
        return RunOutcome::NoConstituents;
    }

    info!(
        count = tickers.len(),
        window = %window,
        "Found tickers. Getting valid tickers..."
    );
    let valid = validate_tickers(prices, &tickers, window, batch_size).await;
    if valid.is_empty() {
        error!("No valid tickers available for analysis.");
        return RunOutcome::NoValidTickers;
    }

    info!(count = valid.len(), "Processing valid tickers...");
    match build_return_matrix(prices, &valid, window).await {
        Some(matrix) => RunOutcome::Ready(matrix),
        None => RunOutcome::NoReturns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use chrono::{Duration, NaiveDate};
    use std::cell::RefCell;
    use std::collections::HashMap;

    use crate::symbols::normalize_symbol;
    use crate::types::{PriceFrame, PriceSeries};

    struct FixedConstituents(Vec<&'static str>);

    impl ConstituentSource for FixedConstituents {
        async fn constituents(&self) -> Vec<String> {
            self.0.iter().map(|s| normalize_symbol(s)).collect()
        }
    }

    /// Serves fixed daily closes per symbol, records every request.
    struct FakePrices {
        closes: HashMap<&'static str, Vec<f64>>,
        fail_all: bool,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl FakePrices {
        fn new(closes: &[(&'static str, Vec<f64>)]) -> Self {
            Self {
                closes: closes.iter().cloned().collect(),
                fail_all: false,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl PriceSource for FakePrices {
        async fn adjusted_close(
            &self,
            symbols: &[String],
            window: &DateWindow,
        ) -> Result<PriceFrame> {
            self.calls.borrow_mut().push(symbols.to_vec());
            if self.fail_all {
                bail!("503 Service Unavailable");
            }
            let series = symbols
                .iter()
                .filter_map(|s| {
                    self.closes.get(s.as_str()).map(|closes| PriceSeries {
                        symbol: s.clone(),
                        points: closes
                            .iter()
                            .enumerate()
                            .map(|(i, p)| (window.start + Duration::days(i as i64), Some(*p)))
                            .collect(),
                    })
                })
                .collect();
            Ok(PriceFrame::from_series(series))
        }
    }

    fn window() -> DateWindow {
        DateWindow::trailing(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(), 30).unwrap()
    }

    #[tokio::test]
    async fn end_to_end_keeps_tickers_with_data() {
        let constituents = FixedConstituents(vec!["AAA", "BRK.B", "BF.B"]);
        let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64).collect();
        let prices = FakePrices::new(&[("AAA", closes.clone()), ("BRK-B", closes)]);

        let outcome = run(&constituents, &prices, &window(), 20).await;
        let matrix = match outcome {
            RunOutcome::Ready(m) => m,
            other => panic!("expected a matrix, got {other:?}"),
        };

        assert_eq!(matrix.tickers, vec!["AAA", "BRK-B"]);
        assert_eq!(matrix.n_rows(), 20);

        let calls = prices.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], vec!["AAA", "BRK-B", "BF-B"]);
        assert_eq!(calls[1], vec!["AAA", "BRK-B"]);
    }

    #[tokio::test]
    async fn empty_constituents_make_no_price_calls() {
        let prices = FakePrices::new(&[("AAA", vec![1.0, 2.0])]);
        let outcome = run(&FixedConstituents(vec![]), &prices, &window(), 20).await;

        assert_eq!(outcome, RunOutcome::NoConstituents);
        assert!(prices.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn no_valid_tickers_skips_bulk_download() {
        let mut prices = FakePrices::new(&[("AAA", vec![1.0, 2.0])]);
        prices.fail_all = true;
        let constituents = FixedConstituents(vec!["AAA", "BBB", "CCC"]);

        let outcome = run(&constituents, &prices, &window(), 2).await;

        assert_eq!(outcome, RunOutcome::NoValidTickers);
        // Two validation batches, no bulk request.
        assert_eq!(prices.calls.borrow().len(), 2);
    }

    #[tokio::test]
    async fn unknown_tickers_only_is_no_valid_tickers() {
        let prices = FakePrices::new(&[]);
        let outcome = run(&FixedConstituents(vec!["ZZZ"]), &prices, &window(), 20).await;
        assert_eq!(outcome, RunOutcome::NoValidTickers);
        assert_eq!(prices.calls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn single_price_day_gives_no_returns() {
        let prices = FakePrices::new(&[("AAA", vec![10.0])]);
        let outcome = run(&FixedConstituents(vec!["AAA"]), &prices, &window(), 20).await;
        assert_eq!(outcome, RunOutcome::NoReturns);
    }
}
