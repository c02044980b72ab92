//! Configuration parsing for the recorder.
//!
//! All pipelines read their settings from a single JSON config file. Every
//! field is optional; the `effective_*` accessors supply the defaults. A
//! pipeline section that is absent disables that pipeline.
//!
//! # Example config
//!
//! ```json
//! {
//!   "recorder":  { "module_name": "tape", "log_path": "/var/log/tape", "log_format": "json" },
//!   "feed":      { "ws_url": "wss://stream.binance.com:9443/ws", "recv_timeout_sec": 60 },
//!   "reconnect": { "base_delay_ms": 5000, "max_delay_ms": 60000, "jitter": true },
//!   "health":    { "interval_sec": 30 },
//!   "ticker":    { "symbols": ["BTCUSDT"], "output_path": "binance_ticker_data.csv.gz" },
//!   "depth":     { "symbols": ["BTCUSDT", "ETHUSDT"], "levels": 20 }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::RecorderError;
use crate::logging::LogFormat;

/// Default Binance raw-stream endpoint.
pub const DEFAULT_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    #[serde(rename = "recorder")]
    pub meta: Option<ModuleMeta>,

    /// Exchange stream endpoint settings.
    pub feed: Option<FeedConfig>,

    /// Reconnect backoff settings shared by every pipeline.
    pub reconnect: Option<ReconnectConfig>,

    /// Health report cadence.
    pub health: Option<HealthConfig>,

    /// 24h ticker pipeline. Absent = disabled.
    pub ticker: Option<TickerConfig>,

    /// Partial order-book depth pipeline. Absent = disabled.
    pub depth: Option<DepthConfig>,
}

impl AppConfig {
    /// Returns the module name used as log file prefix.
    pub fn module_name(&self) -> String {
        self.meta
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| "tape".to_string())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.meta.as_ref().and_then(|m| m.log_path.clone())
    }

    pub fn log_format(&self) -> LogFormat {
        self.meta.as_ref().and_then(|m| m.log_format).unwrap_or_default()
    }

    pub fn feed(&self) -> FeedConfig {
        self.feed.clone().unwrap_or_default()
    }

    pub fn reconnect(&self) -> ReconnectConfig {
        self.reconnect.clone().unwrap_or_default()
    }

    /// Interval between health reports (default 30s).
    pub fn health_interval(&self) -> Duration {
        let secs = self.health.as_ref().and_then(|h| h.interval_sec).unwrap_or(30);
        Duration::from_secs(secs)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), RecorderError> {
        let feed = self.feed();
        let ws_url = feed.effective_ws_url();
        let parsed = url::Url::parse(&ws_url)
            .map_err(|e| RecorderError::Config(format!("invalid ws_url '{ws_url}': {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(RecorderError::Config(format!(
                "ws_url must use ws:// or wss://, got '{ws_url}'"
            )));
        }
        if feed.effective_recv_timeout().is_zero() {
            return Err(RecorderError::Config("recv_timeout_sec must be > 0".into()));
        }

        let reconnect = self.reconnect();
        if reconnect.effective_base_delay().is_zero() {
            return Err(RecorderError::Config("base_delay_ms must be > 0".into()));
        }
        if reconnect.effective_base_delay() > reconnect.effective_max_delay() {
            return Err(RecorderError::Config(
                "base_delay_ms must not exceed max_delay_ms".into(),
            ));
        }
        if self.health_interval().is_zero() {
            return Err(RecorderError::Config("health interval_sec must be > 0".into()));
        }

        if let Some(depth) = &self.depth {
            let levels = depth.effective_levels();
            if !(1..=MAX_DEPTH_LEVELS).contains(&levels) {
                return Err(RecorderError::Config(format!(
                    "depth levels must be within 1..={MAX_DEPTH_LEVELS}, got {levels}"
                )));
            }
            let speed = depth.effective_update_speed_ms();
            if speed != 100 && speed != 1000 {
                return Err(RecorderError::Config(format!(
                    "depth update_speed_ms must be 100 or 1000, got {speed}"
                )));
            }
            if depth.symbols.is_empty() {
                return Err(RecorderError::Config("depth needs at least one symbol".into()));
            }
            if depth.symbols.iter().any(|s| s.trim().is_empty()) {
                return Err(RecorderError::Config("depth symbols must not be empty".into()));
            }
        }

        if self.ticker.is_none() && self.depth.is_none() {
            return Err(RecorderError::Config(
                "no pipeline configured (expected 'ticker' and/or 'depth')".into(),
            ));
        }
        Ok(())
    }
}

/// Module metadata block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
    /// File sink encoding: `"text"` (default) or `"json"`.
    pub log_format: Option<LogFormat>,
}

/// Exchange stream endpoint settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedConfig {
    /// Raw-stream base URL (default: [`DEFAULT_WS_URL`]).
    pub ws_url: Option<String>,

    /// Seconds without any frame before the connection is treated as dead.
    pub recv_timeout_sec: Option<u64>,

    /// Extra HTTP headers for the WebSocket handshake.
    pub extra_headers: Option<HashMap<String, String>>,
}

impl FeedConfig {
    pub fn effective_ws_url(&self) -> String {
        self.ws_url
            .clone()
            .unwrap_or_else(|| DEFAULT_WS_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn effective_recv_timeout(&self) -> Duration {
        Duration::from_secs(self.recv_timeout_sec.unwrap_or(60))
    }
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconnectConfig {
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<bool>,
}

impl ReconnectConfig {
    /// Delay after the first failure (default 5s).
    pub fn effective_base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms.unwrap_or(5_000))
    }

    /// Upper bound on the exponential delay (default 60s).
    pub fn effective_max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.unwrap_or(60_000))
    }

    pub fn effective_jitter(&self) -> bool {
        self.jitter.unwrap_or(true)
    }
}

/// Health report cadence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthConfig {
    pub interval_sec: Option<u64>,
}

/// 24h rolling-window ticker pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickerConfig {
    /// Symbols to record. Empty or absent = the whole market (`!ticker@arr`).
    pub symbols: Option<Vec<String>>,

    /// Output log. A `.gz` suffix enables gzip.
    pub output_path: Option<String>,

    /// Single-instance marker file.
    pub lock_path: Option<String>,
}

impl TickerConfig {
    pub fn effective_symbols(&self) -> Vec<String> {
        self.symbols.clone().unwrap_or_default()
    }

    pub fn effective_output_path(&self) -> PathBuf {
        PathBuf::from(
            self.output_path
                .as_deref()
                .unwrap_or("binance_ticker_data.csv.gz"),
        )
    }

    pub fn effective_lock_path(&self) -> PathBuf {
        PathBuf::from(self.lock_path.as_deref().unwrap_or(".tape-ticker.lock"))
    }
}

/// Largest partial book Binance publishes.
pub const MAX_DEPTH_LEVELS: usize = 20;

/// Partial order-book depth pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepthConfig {
    /// Symbols to record, one subscription each.
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Number of price levels per side kept in each row (default 20).
    pub levels: Option<usize>,

    /// Stream update speed, 100 or 1000 ms (default 1000).
    pub update_speed_ms: Option<u64>,

    /// Directory holding the per-symbol logs (default `.`).
    pub output_dir: Option<String>,

    /// File name prefix, completed with `_<SYMBOL>.csv` (default `binance_order_book`).
    pub file_prefix: Option<String>,

    /// Gzip the per-symbol logs (default false).
    pub compress: Option<bool>,

    /// Single-instance marker file.
    pub lock_path: Option<String>,
}

impl DepthConfig {
    pub fn effective_levels(&self) -> usize {
        self.levels.unwrap_or(MAX_DEPTH_LEVELS)
    }

    pub fn effective_update_speed_ms(&self) -> u64 {
        self.update_speed_ms.unwrap_or(1000)
    }

    pub fn effective_compress(&self) -> bool {
        self.compress.unwrap_or(false)
    }

    pub fn effective_lock_path(&self) -> PathBuf {
        PathBuf::from(
            self.lock_path
                .as_deref()
                .unwrap_or(".crypto-stream-order-book.lock"),
        )
    }

    /// Per-symbol output log path.
    pub fn output_path_for(&self, symbol: &str) -> PathBuf {
        let dir = Path::new(self.output_dir.as_deref().unwrap_or("."));
        let prefix = self.file_prefix.as_deref().unwrap_or("binance_order_book");
        let ext = if self.effective_compress() { "csv.gz" } else { "csv" };
        dir.join(format!("{prefix}_{symbol}.{ext}"))
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn defaults_apply_to_minimal_config() {
        let cfg = parse(r#"{"ticker": {}}"#);
        cfg.validate().unwrap();
        assert_eq!(cfg.module_name(), "tape");
        assert_eq!(cfg.log_format(), LogFormat::Text);
        assert_eq!(cfg.health_interval(), Duration::from_secs(30));
        assert_eq!(cfg.feed().effective_ws_url(), DEFAULT_WS_URL);
        assert_eq!(cfg.reconnect().effective_base_delay(), Duration::from_secs(5));
        let ticker = cfg.ticker.unwrap();
        assert!(ticker.effective_symbols().is_empty());
        assert_eq!(ticker.effective_output_path(), PathBuf::from("binance_ticker_data.csv.gz"));
    }

    #[test]
    fn depth_output_path_follows_compression() {
        let cfg = parse(
            r#"{"depth": {"symbols": ["BTCUSDT"], "output_dir": "/data", "compress": true}}"#,
        );
        let depth = cfg.depth.unwrap();
        assert_eq!(
            depth.output_path_for("BTCUSDT"),
            PathBuf::from("/data/binance_order_book_BTCUSDT.csv.gz")
        );
    }

    #[test]
    fn rejects_out_of_range_levels() {
        let cfg = parse(r#"{"depth": {"symbols": ["BTCUSDT"], "levels": 50}}"#);
        assert!(matches!(cfg.validate(), Err(RecorderError::Config(_))));
    }

    #[test]
    fn rejects_non_websocket_url() {
        let cfg = parse(r#"{"feed": {"ws_url": "https://example.com"}, "ticker": {}}"#);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_backoff_bounds() {
        let cfg = parse(
            r#"{"reconnect": {"base_delay_ms": 10000, "max_delay_ms": 1000}, "ticker": {}}"#,
        );
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_depth_without_symbols() {
        let cfg = parse(r#"{"depth": {"symbols": []}}"#);
        assert!(matches!(cfg.validate(), Err(RecorderError::Config(_))));
    }

    #[test]
    fn rejects_empty_config() {
        assert!(parse("{}").validate().is_err());
    }
}
