// =============================================================================
// Runtime Configuration — compiled-in defaults with optional overrides
// =============================================================================
//
// Every knob of a run lives here.  Defaults reproduce the fixed behaviour
// (30-day window, batches of 20, Wikipedia constituent list).  A JSON file
// and `HEATMAP_*` environment variables may override them; all fields carry
// `#[serde(default)]` so a partial file is always accepted.
//
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::DateWindow;
use crate::validator::DEFAULT_BATCH_SIZE;

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "heatmap_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_lookback_days() -> u32 {
    30
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_constituents_url() -> String {
    "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies".to_string()
}

fn default_chart_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; sp500-heatmap/1.0)".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration of a heatmap run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Window & batching --------------------------------------------------

    /// Width of the trailing date window in calendar days.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Tickers per validation request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    // --- Data sources -------------------------------------------------------

    /// Page whose `Symbol` table lists the index constituents.
    #[serde(default = "default_constituents_url")]
    pub constituents_url: String,

    /// Base URL of the chart API.
    #[serde(default = "default_chart_base_url")]
    pub chart_base_url: String,

    // --- HTTP transport -----------------------------------------------------

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Skip TLS certificate verification on the shared HTTP client.
    /// Opt-in only; affects no other client in the process.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    // --- Output -------------------------------------------------------------

    /// Where the SVG heatmap is written.  `None` means the system temp dir.
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// Hand the rendered file to the platform viewer.
    #[serde(default = "default_true")]
    pub open_viewer: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            batch_size: default_batch_size(),
            constituents_url: default_constituents_url(),
            chart_base_url: default_chart_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            accept_invalid_certs: false,
            output_path: None,
            open_viewer: true,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing or malformed file is an error; the caller falls back to
    /// defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            lookback_days = config.lookback_days,
            batch_size = config.batch_size,
            "config loaded"
        );

        Ok(config)
    }

    /// Apply `HEATMAP_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.  Unparseable values are
    /// ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("HEATMAP_LOOKBACK_DAYS") {
            match v.trim().parse() {
                Ok(days) => self.lookback_days = days,
                Err(_) => warn!(value = %v, "ignoring invalid HEATMAP_LOOKBACK_DAYS"),
            }
        }
        if let Some(v) = lookup("HEATMAP_BATCH_SIZE") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.batch_size = n,
                _ => warn!(value = %v, "ignoring invalid HEATMAP_BATCH_SIZE"),
            }
        }
        if let Some(v) = lookup("HEATMAP_ACCEPT_INVALID_CERTS") {
            match parse_flag(&v) {
                Some(flag) => self.accept_invalid_certs = flag,
                None => warn!(value = %v, "ignoring invalid HEATMAP_ACCEPT_INVALID_CERTS"),
            }
        }
        if let Some(v) = lookup("HEATMAP_OPEN_VIEWER") {
            match parse_flag(&v) {
                Some(flag) => self.open_viewer = flag,
                None => warn!(value = %v, "ignoring invalid HEATMAP_OPEN_VIEWER"),
            }
        }
        if let Some(v) = lookup("HEATMAP_OUTPUT") {
            let v = v.trim();
            if !v.is_empty() {
                self.output_path = Some(PathBuf::from(v));
            }
        }
    }

    /// Trailing date window ending at `today`.  A lookback reaching past the
    /// representable date range falls back to the default with a warning.
    pub fn window_ending(&self, today: NaiveDate) -> Option<DateWindow> {
        DateWindow::trailing(today, self.lookback_days).or_else(|| {
            warn!(
                lookback_days = self.lookback_days,
                fallback = default_lookback_days(),
                "lookback out of date range, using default"
            );
            DateWindow::trailing(today, default_lookback_days())
        })
    }

    /// Resolved heatmap output file.
    pub fn output_file(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("sp500_returns_heatmap.svg"))
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.lookback_days, 30);
        assert_eq!(cfg.batch_size, 20);
        assert_eq!(
            cfg.constituents_url,
            "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies"
        );
        assert!(!cfg.accept_invalid_certs);
        assert!(cfg.open_viewer);
        assert!(cfg.output_path.is_none());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.lookback_days, 30);
        assert_eq!(cfg.batch_size, 20);
        assert_eq!(cfg.chart_base_url, "https://query1.finance.yahoo.com");
        assert!(cfg.open_viewer);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "batch_size": 5, "accept_invalid_certs": true }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.batch_size, 5);
        assert!(cfg.accept_invalid_certs);
        assert_eq!(cfg.lookback_days, 30);
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("HEATMAP_LOOKBACK_DAYS", "10"),
            ("HEATMAP_BATCH_SIZE", "0"),
            ("HEATMAP_ACCEPT_INVALID_CERTS", "yes"),
            ("HEATMAP_OPEN_VIEWER", "maybe"),
            ("HEATMAP_OUTPUT", "/tmp/out.svg"),
        ]
        .into_iter()
        .collect();

        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.lookback_days, 10);
        assert_eq!(cfg.batch_size, 20);
        assert!(cfg.accept_invalid_certs);
        assert!(cfg.open_viewer);
        assert_eq!(cfg.output_file(), PathBuf::from("/tmp/out.svg"));
    }

    #[test]
    fn huge_lookback_falls_back_to_default_window() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| (k == "HEATMAP_LOOKBACK_DAYS").then(|| u32::MAX.to_string()));
        assert_eq!(cfg.lookback_days, u32::MAX);

        let window = cfg.window_ending(today).unwrap();
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(window.end, today);
    }

    #[test]
    fn output_file_defaults_to_temp_dir() {
        let cfg = RuntimeConfig::default();
        assert_eq!(
            cfg.output_file(),
            std::env::temp_dir().join("sp500_returns_heatmap.svg")
        );
    }
}
