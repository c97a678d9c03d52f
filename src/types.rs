// =============================================================================
// Shared types used across the heatmap pipeline
// =============================================================================

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveTime};

/// Price in the quote currency.
pub type Price = f64;

// ---------------------------------------------------------------------------
// DateWindow
// ---------------------------------------------------------------------------

/// Trailing window of calendar days ending at `end`.
///
/// `start` is inclusive; `end` is passed to the price source as an exclusive
/// upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window of `days` calendar days ending at `end`.  `None` when the
    /// start would fall outside the representable date range.
    pub fn trailing(end: NaiveDate, days: u32) -> Option<Self> {
        let start = end.checked_sub_days(Days::new(u64::from(days)))?;
        Some(Self { start, end })
    }

    /// Start of the window as UTC epoch seconds (midnight).
    pub fn start_ts(&self) -> i64 {
        self.start.and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    /// End of the window as UTC epoch seconds (midnight, exclusive).
    pub fn end_ts(&self) -> i64 {
        self.end.and_time(NaiveTime::MIN).and_utc().timestamp()
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// PriceSeries
// ---------------------------------------------------------------------------

/// Adjusted-close history of one ticker, ascending by date.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<(NaiveDate, Option<Price>)>,
}

impl PriceSeries {
    /// Number of dates carrying an actual price.
    pub fn observed(&self) -> usize {
        self.points.iter().filter(|(_, p)| p.is_some()).count()
    }
}

// ---------------------------------------------------------------------------
// PriceFrame
// ---------------------------------------------------------------------------

/// Joint response of a multi-ticker price request: dates × tickers.
///
/// Dates are the ascending union of every series' dates.  A ticker the source
/// had nothing for has no column at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceFrame {
    dates: Vec<NaiveDate>,
    columns: Vec<(String, Vec<Option<Price>>)>,
}

impl PriceFrame {
    /// Align several series on the union of their dates.
    ///
    /// Column order follows the input order.  A later series for a symbol
    /// already present replaces the earlier column.
    pub fn from_series(series: Vec<PriceSeries>) -> Self {
        let mut index: BTreeMap<NaiveDate, usize> = series
            .iter()
            .flat_map(|s| s.points.iter().map(|(d, _)| (*d, 0)))
            .collect();
        for (pos, slot) in index.values_mut().enumerate() {
            *slot = pos;
        }
        let dates: Vec<NaiveDate> = index.keys().copied().collect();

        let mut columns: Vec<(String, Vec<Option<Price>>)> = Vec::with_capacity(series.len());
        for s in series {
            let mut cells = vec![None; dates.len()];
            for (date, price) in s.points {
                if let Some(&row) = index.get(&date) {
                    cells[row] = price;
                }
            }
            match columns.iter_mut().find(|(sym, _)| *sym == s.symbol) {
                Some(existing) => existing.1 = cells,
                None => columns.push((s.symbol, cells)),
            }
        }

        Self { dates, columns }
    }

    /// `true` when the frame has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The adjusted-close column of `symbol`, if the response holds one.
    pub fn column(&self, symbol: &str) -> Option<&[Option<Price>]> {
        self.columns
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, cells)| cells.as_slice())
    }
}

// ---------------------------------------------------------------------------
// ReturnMatrix
// ---------------------------------------------------------------------------

/// Day-over-day fractional returns: rows are dates, columns are tickers.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnMatrix {
    pub dates: Vec<NaiveDate>,
    pub tickers: Vec<String>,
    /// `rows[i][j]` is the return of `tickers[j]` on `dates[i]`.
    pub rows: Vec<Vec<f64>>,
}

impl ReturnMatrix {
    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.tickers.len()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().flat_map(|r| r.iter().copied())
    }
}
