// =============================================================================
// Constituent Lister — index membership from the public reference page
// =============================================================================
//
// The page is scanned for the first `<table>` whose header row names a
// `Symbol` column.  Every entry of that column is normalized and returned in
// page order, duplicates included.  Failures never propagate: the lister logs
// them and yields an empty list, which the caller treats as "abort the run".
// =============================================================================

use anyhow::{bail, Context, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{error, info, instrument};

use crate::symbols::normalize_symbol;

/// Header text identifying the ticker column.
const SYMBOL_COLUMN: &str = "Symbol";

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Anything that can produce the ordered constituent list.
///
/// Implementations swallow their own errors and return an empty list.
pub trait ConstituentSource {
    async fn constituents(&self) -> Vec<String>;
}

/// Constituents scraped from an HTML page over HTTP.
#[derive(Debug, Clone)]
pub struct WebConstituents {
    http: reqwest::Client,
    url: String,
}

impl WebConstituents {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    #[instrument(skip(self), fields(url = %self.url), name = "constituents::fetch")]
    async fn fetch_page(&self) -> Result<String> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("constituent page request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("constituent page returned {}", status);
        }

        resp.text()
            .await
            .context("failed to read constituent page body")
    }
}

impl ConstituentSource for WebConstituents {
    async fn constituents(&self) -> Vec<String> {
        let result = match self.fetch_page().await {
            Ok(html) => parse_constituents(&html),
            Err(e) => Err(e),
        };

        match result {
            Ok(tickers) => {
                info!(count = tickers.len(), "constituent list parsed");
                tickers
            }
            Err(e) => {
                let reason = format!("{e:#}");
                error!(error = %reason, "error fetching S&P 500 tickers");
                Vec::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HTML table parsing
// ---------------------------------------------------------------------------

/// Extract and normalize the `Symbol` column of the first table that has one.
pub fn parse_constituents(html: &str) -> Result<Vec<String>> {
    let raw = extract_symbol_column(html)?;
    Ok(raw.iter().map(|s| normalize_symbol(s)).collect())
}

fn extract_symbol_column(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;

    let mut tables_seen = 0usize;
    for table in document.select(&table_sel) {
        tables_seen += 1;
        let rows: Vec<Vec<Cell>> = table.select(&row_sel).map(row_cells).collect();

        let Some(header_idx) = rows
            .iter()
            .position(|r| !r.is_empty() && r.iter().all(|c| c.is_header))
        else {
            continue;
        };
        let Some(col) = rows[header_idx]
            .iter()
            .position(|c| c.text == SYMBOL_COLUMN)
        else {
            continue;
        };

        let symbols = rows[header_idx + 1..]
            .iter()
            .filter(|r| r.iter().any(|c| !c.is_header))
            .filter_map(|r| r.get(col))
            .map(|c| c.text.clone())
            .filter(|s| !s.is_empty())
            .collect();
        return Ok(symbols);
    }

    if tables_seen == 0 {
        bail!("no tables found on constituent page");
    }
    bail!("none of {tables_seen} tables has a '{SYMBOL_COLUMN}' column");
}

struct Cell {
    text: String,
    is_header: bool,
}

/// Direct `th`/`td` children of a row, so nested tables do not leak in.
fn row_cells(row: ElementRef<'_>) -> Vec<Cell> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter_map(|el| {
            let is_header = match el.value().name() {
                "th" => true,
                "td" => false,
                _ => return None,
            };
            let text = el.text().collect::<String>().trim().to_string();
            Some(Cell { text, is_header })
        })
        .collect()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid selector '{css}': {e}"))
}
