//! Module registry: factory for creating recorder modules from config.

use std::sync::Arc;

use anyhow::Result;
use tape_core::config::AppConfig;
use tape_core::feed::Feed;
use tape_core::ws::WsFeed;

use crate::RecorderModule;
use crate::binance::{self, config::BinanceConfig};

/// Which configured pipelines to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineSelection {
    #[default]
    All,
    Ticker,
    Depth,
}

impl PipelineSelection {
    fn wants_ticker(self) -> bool {
        matches!(self, Self::All | Self::Ticker)
    }

    fn wants_depth(self) -> bool {
        matches!(self, Self::All | Self::Depth)
    }
}

/// Create the configured modules on top of a WebSocket feed.
pub fn create_modules(
    config: &AppConfig,
    selection: PipelineSelection,
) -> Result<Vec<Box<dyn RecorderModule>>> {
    let feed = Arc::new(WsFeed::from_config(&config.feed())?);
    create_modules_with_feed(config, selection, feed)
}

/// Create the configured modules on top of any feed.
///
/// Order is fixed (ticker, then depth) so marker acquisition is
/// deterministic.
pub fn create_modules_with_feed<F: Feed>(
    config: &AppConfig,
    selection: PipelineSelection,
    feed: Arc<F>,
) -> Result<Vec<Box<dyn RecorderModule>>> {
    let cfg = BinanceConfig::from_app(config)?;
    let mut modules: Vec<Box<dyn RecorderModule>> = Vec::new();

    if selection.wants_ticker() {
        if let Some(plan) = &cfg.ticker {
            modules.push(Box::new(binance::build_ticker(&cfg, plan, feed.clone())));
        }
    }
    if selection.wants_depth() {
        if let Some(plan) = &cfg.depth {
            modules.push(Box::new(binance::build_depth(&cfg, plan, feed.clone())));
        }
    }

    if modules.is_empty() {
        anyhow::bail!("no configured pipeline matches selection {selection:?}");
    }
    Ok(modules)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::test_support::ScriptedFeed;

    fn both() -> AppConfig {
        serde_json::from_str(
            r#"{ "ticker": { "symbols": ["BTCUSDT"] },
                 "depth":  { "symbols": ["BTCUSDT"], "lock_path": "/tmp/depth.lock" } }"#,
        )
        .unwrap()
    }

    #[test]
    fn all_builds_ticker_then_depth() {
        let feed = Arc::new(ScriptedFeed::default());
        let modules = create_modules_with_feed(&both(), PipelineSelection::All, feed).unwrap();
        let names: Vec<&str> = modules.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["ticker", "depth"]);
        assert_eq!(modules[0].lock_path(), Path::new(".tape-ticker.lock"));
        assert_eq!(modules[1].lock_path(), Path::new("/tmp/depth.lock"));
    }

    #[test]
    fn selection_filters_modules() {
        let feed = Arc::new(ScriptedFeed::default());
        let modules = create_modules_with_feed(&both(), PipelineSelection::Depth, feed).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name(), "depth");
    }

    #[test]
    fn selecting_unconfigured_pipeline_fails() {
        let cfg: AppConfig = serde_json::from_str(r#"{ "ticker": {} }"#).unwrap();
        let feed = Arc::new(ScriptedFeed::default());
        assert!(create_modules_with_feed(&cfg, PipelineSelection::Depth, feed).is_err());
    }

    #[test]
    fn invalid_header_fails_ws_feed_creation() {
        let cfg: AppConfig = serde_json::from_str(
            r#"{ "feed": { "extra_headers": { "bad header": "x" } }, "ticker": {} }"#,
        )
        .unwrap();
        assert!(create_modules(&cfg, PipelineSelection::All).is_err());
    }
}
