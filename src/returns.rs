// =============================================================================
// Return Matrix Builder — daily percentage change of adjusted close
// =============================================================================
//
//   r[t] = (p[t] - p[t-1]) / p[t-1]
//
// computed per ticker against its own previous row.  A cell is undefined when
// either price is missing or the previous price is zero; any row holding an
// undefined cell is dropped whole.  The first row never survives.
// =============================================================================

use tracing::{error, info, warn};

use crate::market_data::PriceSource;
use crate::types::{DateWindow, PriceFrame, ReturnMatrix};

/// Fetch prices for `tickers` in one joint request and derive their returns.
///
/// Any failure is logged and yields `None`.
pub async fn build_return_matrix<S: PriceSource>(
    source: &S,
    tickers: &[String],
    window: &DateWindow,
) -> Option<ReturnMatrix> {
    let frame = match source.adjusted_close(tickers, window).await {
        Ok(frame) => frame,
        Err(e) => {
            let reason = format!("{e:#}");
            error!(error = %reason, "error downloading price history");
            return None;
        }
    };

    if frame.is_empty() {
        error!(tickers = tickers.len(), "price download returned no data");
        return None;
    }

    let matrix = daily_returns(&frame, tickers);
    if matrix.n_rows() == 0 {
        error!(
            dates = frame.dates().len(),
            "no date has a complete set of returns"
        );
        return None;
    }

    info!(
        rows = matrix.n_rows(),
        cols = matrix.n_cols(),
        "return matrix built"
    );
    Some(matrix)
}

/// Percentage change of every column of `frame`, restricted to complete rows.
///
/// Columns follow `order`; tickers missing from the frame are left out.
pub fn daily_returns(frame: &PriceFrame, order: &[String]) -> ReturnMatrix {
    let mut tickers = Vec::with_capacity(order.len());
    let mut columns = Vec::with_capacity(order.len());
    for ticker in order {
        match frame.column(ticker) {
            Some(cells) => {
                tickers.push(ticker.clone());
                columns.push(cells);
            }
            None => warn!(ticker = %ticker, "no prices in bulk download, dropping column"),
        }
    }

    let mut dates = Vec::new();
    let mut rows = Vec::new();
    if columns.is_empty() {
        return ReturnMatrix {
            dates,
            tickers,
            rows,
        };
    }
    for (t, date) in frame.dates().iter().enumerate().skip(1) {
        let row: Option<Vec<f64>> = columns
            .iter()
            .map(|cells| pct_change(cells[t - 1], cells[t]))
            .collect();
        if let Some(row) = row {
            dates.push(*date);
            rows.push(row);
        }
    }

    ReturnMatrix {
        dates,
        tickers,
        rows,
    }
}

fn pct_change(prev: Option<f64>, cur: Option<f64>) -> Option<f64> {
    let (prev, cur) = (prev?, cur?);
    if prev == 0.0 {
        return None;
    }
    let r = (cur - prev) / prev;
    r.is_finite().then_some(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use chrono::NaiveDate;

    use crate::types::PriceSeries;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn series(symbol: &str, prices: &[Option<f64>]) -> PriceSeries {
        PriceSeries {
            symbol: symbol.into(),
            points: prices
                .iter()
                .enumerate()
                .map(|(i, p)| (d(4 + i as u32), *p))
                .collect(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn two_tickers_five_dates_give_four_rows() {
        let a = [100.0, 102.0, 99.96, 101.0, 101.0];
        let b = [50.0, 49.0, 49.49, 52.0, 51.48];
        let frame = PriceFrame::from_series(vec![
            series("AAA", &a.map(Some)),
            series("BBB", &b.map(Some)),
        ]);

        let m = daily_returns(&frame, &names(&["AAA", "BBB"]));
        assert_eq!(m.n_rows(), 4);
        assert_eq!(m.tickers, vec!["AAA", "BBB"]);
        assert_eq!(m.dates, vec![d(5), d(6), d(7), d(8)]);

        for t in 1..5 {
            let ea = (a[t] - a[t - 1]) / a[t - 1];
            let eb = (b[t] - b[t - 1]) / b[t - 1];
            assert!((m.rows[t - 1][0] - ea).abs() < 1e-12);
            assert!((m.rows[t - 1][1] - eb).abs() < 1e-12);
        }
        assert!((m.rows[0][0] - 0.02).abs() < 1e-12);
        assert!((m.rows[3][0]).abs() < 1e-12);
    }

    #[test]
    fn missing_value_removes_its_row() {
        let frame = PriceFrame::from_series(vec![
            series("AAA", &[Some(10.0), Some(11.0), Some(12.0), Some(13.0)]),
            series("BBB", &[Some(20.0), Some(21.0), None, Some(23.0)]),
        ]);

        let m = daily_returns(&frame, &names(&["AAA", "BBB"]));
        assert!(!m.dates.contains(&d(6)));
        // The following day has no predecessor for BBB either.
        assert_eq!(m.dates, vec![d(5)]);
        assert_eq!(m.rows.len(), 1);
    }

    #[test]
    fn no_matching_columns_gives_empty_matrix() {
        let frame = PriceFrame::from_series(vec![series("AAA", &[Some(1.0), Some(2.0)])]);
        let m = daily_returns(&frame, &names(&["ZZZ"]));
        assert_eq!(m.n_rows(), 0);
        assert_eq!(m.n_cols(), 0);
    }

    #[test]
    fn date_missing_from_one_series_is_dropped() {
        let frame = PriceFrame::from_series(vec![
            series("AAA", &[Some(10.0), Some(11.0), Some(12.0)]),
            PriceSeries {
                symbol: "BBB".into(),
                points: vec![(d(4), Some(1.0)), (d(5), Some(2.0))],
            },
        ]);
        let m = daily_returns(&frame, &names(&["AAA", "BBB"]));
        assert_eq!(m.dates, vec![d(5)]);
    }

    #[test]
    fn zero_previous_price_is_undefined() {
        let frame = PriceFrame::from_series(vec![series(
            "AAA",
            &[Some(1.0), Some(0.0), Some(2.0), Some(3.0)],
        )]);
        let m = daily_returns(&frame, &names(&["AAA"]));
        assert_eq!(m.dates, vec![d(5), d(7)]);
        assert!((m.rows[0][0] + 1.0).abs() < 1e-12);
        assert!((m.rows[1][0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn columns_follow_requested_order_and_skip_absent() {
        let frame = PriceFrame::from_series(vec![
            series("BBB", &[Some(1.0), Some(2.0)]),
            series("AAA", &[Some(4.0), Some(5.0)]),
        ]);
        let m = daily_returns(&frame, &names(&["AAA", "ZZZ", "BBB"]));
        assert_eq!(m.tickers, vec!["AAA", "BBB"]);
        assert!((m.rows[0][0] - 0.25).abs() < 1e-12);
        assert!((m.rows[0][1] - 1.0).abs() < 1e-12);
    }

    struct StaticSource(Option<PriceFrame>);

    impl PriceSource for StaticSource {
        async fn adjusted_close(&self, _: &[String], _: &DateWindow) -> Result<PriceFrame> {
            match &self.0 {
                Some(frame) => Ok(frame.clone()),
                None => bail!("timed out"),
            }
        }
    }

    fn window() -> DateWindow {
        DateWindow::trailing(d(31), 30).unwrap()
    }

    #[tokio::test]
    async fn download_failure_yields_none() {
        let m = build_return_matrix(&StaticSource(None), &names(&["AAA"]), &window()).await;
        assert!(m.is_none());
    }

    #[tokio::test]
    async fn empty_download_yields_none() {
        let source = StaticSource(Some(PriceFrame::default()));
        assert!(build_return_matrix(&source, &names(&["AAA"]), &window()).await.is_none());
    }

    #[tokio::test]
    async fn single_date_yields_none() {
        let frame = PriceFrame::from_series(vec![series("AAA", &[Some(1.0)])]);
        let source = StaticSource(Some(frame));
        assert!(build_return_matrix(&source, &names(&["AAA"]), &window()).await.is_none());
    }

    #[tokio::test]
    async fn complete_download_yields_matrix() {
        let frame = PriceFrame::from_series(vec![series("AAA", &[Some(1.0), Some(1.5)])]);
        let source = StaticSource(Some(frame));
        let m = build_return_matrix(&source, &names(&["AAA"]), &window())
            .await
            .unwrap();
        assert_eq!(m.n_rows(), 1);
        assert!((m.rows[0][0] - 0.5).abs() < 1e-12);
    }
}
