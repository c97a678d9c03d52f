// =============================================================================
// S&P 500 Daily Returns Heatmap — Main Entry Point
// =============================================================================
//
// One run, one thread: fetch the constituent list, keep the tickers with
// recent prices, compute daily returns and render them as a heatmap.  Every
// failure is reported and ends the run normally.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod constituents;
mod heatmap;
mod http;
mod market_data;
mod pipeline;
mod returns;
mod runtime_config;
mod symbols;
mod types;
mod validator;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::constituents::WebConstituents;
use crate::market_data::YahooChartClient;
use crate::pipeline::RunOutcome;
use crate::runtime_config::{RuntimeConfig, DEFAULT_CONFIG_PATH};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() {
        RuntimeConfig::load(DEFAULT_CONFIG_PATH).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            RuntimeConfig::default()
        })
    } else {
        RuntimeConfig::default()
    };
    config.apply_env();

    let Some(window) = config.window_ending(chrono::Local::now().date_naive()) else {
        error!("Cannot build a date window ending today");
        return;
    };
    info!(
        window = %window,
        batch_size = config.batch_size,
        "S&P 500 returns heatmap starting"
    );

    // ── 2. Shared HTTP client & data sources ─────────────────────────────
    let http = match http::build_client(&config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Cannot create HTTP client");
            return;
        }
    };
    let constituents = WebConstituents::new(http.clone(), config.constituents_url.clone());
    let prices = YahooChartClient::new(http, config.chart_base_url.clone());

    // ── 3. Pipeline ──────────────────────────────────────────────────────
    let outcome = pipeline::run(&constituents, &prices, &window, config.batch_size).await;

    // ── 4. Render ────────────────────────────────────────────────────────
    match outcome {
        RunOutcome::Ready(matrix) => {
            let path = config.output_file();
            if heatmap::show(&matrix, &path, config.open_viewer).is_some() {
                info!(
                    stocks = matrix.n_cols(),
                    days = matrix.n_rows(),
                    path = %path.display(),
                    "Heatmap ready"
                );
            }
        }
        other => info!(outcome = ?other, "Run finished without a heatmap"),
    }
}
