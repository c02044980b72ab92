//! Binance-specific configuration extraction.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tape_core::config::{AppConfig, DepthConfig};
use tape_core::types::{Instrument, instruments_from};
use tape_core::writer::Compression;

use crate::supervisor::ReconnectPolicy;

/// Settings shared by every Binance pipeline.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub ws_url: String,
    pub policy: ReconnectPolicy,
    pub health_interval: Duration,
    pub ticker: Option<TickerPlan>,
    pub depth: Option<DepthPlan>,
}

#[derive(Debug, Clone)]
pub struct TickerPlan {
    /// Empty means the whole market.
    pub symbols: Vec<Instrument>,
    pub output_path: PathBuf,
    pub lock_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DepthPlan {
    pub symbols: Vec<Instrument>,
    pub levels: usize,
    pub update_speed_ms: u64,
    pub compression: Compression,
    pub lock_path: PathBuf,
    source: DepthConfig,
}

impl DepthPlan {
    /// Output log of one symbol's book.
    pub fn output_path_for(&self, symbol: &Instrument) -> PathBuf {
        self.source.output_path_for(symbol.as_str())
    }
}

impl BinanceConfig {
    pub fn from_app(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let ticker = config.ticker.as_ref().map(|t| TickerPlan {
            symbols: instruments_from(&t.effective_symbols()),
            output_path: t.effective_output_path(),
            lock_path: t.effective_lock_path(),
        });

        let depth = config.depth.as_ref().map(|d| DepthPlan {
            symbols: instruments_from(&d.symbols),
            levels: d.effective_levels(),
            update_speed_ms: d.effective_update_speed_ms(),
            compression: if d.effective_compress() {
                Compression::Gzip
            } else {
                Compression::Plain
            },
            lock_path: d.effective_lock_path(),
            source: d.clone(),
        });

        Ok(Self {
            ws_url: config.feed().effective_ws_url(),
            policy: ReconnectPolicy::from_config(&config.reconnect()),
            health_interval: config.health_interval(),
            ticker,
            depth,
        })
    }
}
