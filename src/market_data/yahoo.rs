// =============================================================================
// Yahoo Finance chart API client
// =============================================================================
//
// GET {base}/v8/finance/chart/{symbol}?period1=..&period2=..&interval=1d
//
// The chart endpoint serves one symbol per call, so a joint request is a
// strictly sequential loop over its symbols.  "No data" answers leave the
// symbol out of the frame; transport failures, unexpected statuses and
// undecodable bodies fail the entire request.
// =============================================================================

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::PriceSource;
use crate::types::{DateWindow, Price, PriceFrame, PriceSeries};

/// Yahoo error code for unknown or delisted symbols.
const NOT_FOUND_CODE: &str = "Not Found";

/// Error descriptions Yahoo uses for a symbol without bars in the window.
const NO_DATA_DESCRIPTIONS: [&str; 2] = ["Data doesn't exist", "No data found"];

/// Chart API client sharing the run's HTTP client.
#[derive(Debug, Clone)]
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            symbol
        )
    }

    /// Daily adjusted closes of one symbol.  `Ok(None)` when the provider has
    /// no data for it.
    #[instrument(skip(self, window), name = "yahoo::fetch_series")]
    pub async fn fetch_series(
        &self,
        symbol: &str,
        window: &DateWindow,
    ) -> Result<Option<PriceSeries>> {
        let period1 = window.start_ts().to_string();
        let period2 = window.end_ts().to_string();

        let resp = self
            .http
            .get(self.chart_url(symbol))
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", "1d"),
                ("events", "div,splits"),
            ])
            .send()
            .await
            .with_context(|| format!("chart request for {symbol} failed"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("failed to read chart body for {symbol}"))?;

        if status == StatusCode::NOT_FOUND {
            debug!(symbol, "symbol not found");
            return Ok(None);
        }
        if status == StatusCode::BAD_REQUEST && is_no_data_answer(&body) {
            debug!(symbol, "no bars in window");
            return Ok(None);
        }
        if !status.is_success() {
            bail!("chart API returned {} for {}", status, symbol);
        }

        parse_chart_response(symbol, &body)
    }
}

impl PriceSource for YahooChartClient {
    async fn adjusted_close(&self, symbols: &[String], window: &DateWindow) -> Result<PriceFrame> {
        let mut series = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(s) = self.fetch_series(symbol, window).await? {
                series.push(s);
            }
        }
        debug!(
            requested = symbols.len(),
            returned = series.len(),
            "joint price request complete"
        );
        Ok(PriceFrame::from_series(series))
    }
}

// ---------------------------------------------------------------------------
// Response decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

impl ChartError {
    fn is_no_data(&self) -> bool {
        self.code == NOT_FOUND_CODE
            || NO_DATA_DESCRIPTIONS
                .iter()
                .any(|prefix| self.description.starts_with(prefix))
    }
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// `true` when `body` is an error envelope saying the symbol has no data.
fn is_no_data_answer(body: &str) -> bool {
    serde_json::from_str::<ChartEnvelope>(body)
        .ok()
        .and_then(|e| e.chart.error)
        .is_some_and(|e| e.is_no_data())
}

/// Decode a chart payload into an adjusted-close series.
///
/// Returns `Ok(None)` for "no data" errors and for results without any
/// bars or without an adjusted-close block.
pub fn parse_chart_response(symbol: &str, body: &str) -> Result<Option<PriceSeries>> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .with_context(|| format!("failed to decode chart response for {symbol}"))?;

    if let Some(err) = envelope.chart.error {
        if err.is_no_data() {
            debug!(symbol, description = %err.description, "no chart data");
            return Ok(None);
        }
        bail!("chart API error for {}: {} - {}", symbol, err.code, err.description);
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };
    let Some(adj) = result.indicators.adjclose.into_iter().next() else {
        return Ok(None);
    };
    if result.timestamp.is_empty() {
        return Ok(None);
    }

    let mut points: Vec<(NaiveDate, Option<Price>)> = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let date = DateTime::from_timestamp(ts + result.meta.gmtoffset, 0)
            .with_context(|| format!("timestamp {ts} out of range for {symbol}"))?
            .date_naive();
        let price = adj.adjclose.get(i).copied().flatten().filter(|p| p.is_finite());
        points.push((date, price));
    }
    points.sort_by_key(|(d, _)| *d);
    points.dedup_by_key(|(d, _)| *d);

    let series = PriceSeries {
        symbol: symbol.to_string(),
        points,
    };
    debug!(
        symbol,
        bars = series.points.len(),
        observed = series.observed(),
        "chart series decoded"
    );
    Ok(Some(series))
}
