//! Market data records: the row shapes written to the output logs.
//!
//! Decimal values are kept as the exact strings the exchange delivered so a
//! recorded row never loses precision to a float round-trip.
//!
//! # Column layout
//!
//! Ticker logs use [`TickerRecord::COLUMNS`]. Depth logs use
//! [`depth_columns`]: `Timestamp, Symbol, AV1..AVN, AP1..APN, BV1..BVN, BP1..BPN`.
//! A depth row is always that wide; levels the feed did not deliver are
//! written as empty cells.

use serde::Deserialize;

use super::symbol::Instrument;

/// A value that can be appended to a log as one row.
pub trait Record {
    /// Instrument the row belongs to.
    fn symbol(&self) -> &str;

    /// Field values in header column order.
    fn fields(&self) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// TickerRecord (24h rolling window statistics)
// ---------------------------------------------------------------------------

/// One `24hrTicker` event.
///
/// Field names follow the log header; the serde renames are the single-letter
/// Binance payload keys.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TickerRecord {
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price_change: String,
    #[serde(rename = "P")]
    pub price_change_percent: String,
    #[serde(rename = "w")]
    pub weighted_avg_price: String,
    #[serde(rename = "x")]
    pub prev_close_price: String,
    #[serde(rename = "c")]
    pub last_price: String,
    #[serde(rename = "Q")]
    pub last_qty: String,
    #[serde(rename = "b")]
    pub bid_price: String,
    #[serde(rename = "B")]
    pub bid_qty: String,
    #[serde(rename = "a")]
    pub ask_price: String,
    #[serde(rename = "A")]
    pub ask_qty: String,
    #[serde(rename = "o")]
    pub open_price: String,
    #[serde(rename = "h")]
    pub high_price: String,
    #[serde(rename = "l")]
    pub low_price: String,
    #[serde(rename = "v")]
    pub total_traded_volume: String,
    #[serde(rename = "q")]
    pub total_traded_quote_volume: String,
    #[serde(rename = "O")]
    pub open_time: u64,
    #[serde(rename = "C")]
    pub close_time: u64,
    /// `-1` when no trade happened in the window.
    #[serde(rename = "F")]
    pub first_trade_id: i64,
    #[serde(rename = "L")]
    pub last_trade_id: i64,
    #[serde(rename = "n")]
    pub total_trades: u64,
}

impl TickerRecord {
    /// Log header, in row order.
    pub const COLUMNS: [&'static str; 22] = [
        "EventTime",
        "Symbol",
        "PriceChange",
        "PriceChangePercent",
        "WeightedAvgPrice",
        "PrevClosePrice",
        "LastPrice",
        "LastQty",
        "BidPrice",
        "BidQty",
        "AskPrice",
        "AskQty",
        "OpenPrice",
        "HighPrice",
        "LowPrice",
        "TotalTradedVolume",
        "TotalTradedQuoteAssetVolume",
        "OpenTime",
        "CloseTime",
        "FirstTradeId",
        "LastTradeId",
        "TotalTrades",
    ];

    pub fn header() -> Vec<String> {
        Self::COLUMNS.iter().map(|c| c.to_string()).collect()
    }
}

impl Record for TickerRecord {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.event_time.to_string(),
            self.symbol.clone(),
            self.price_change.clone(),
            self.price_change_percent.clone(),
            self.weighted_avg_price.clone(),
            self.prev_close_price.clone(),
            self.last_price.clone(),
            self.last_qty.clone(),
            self.bid_price.clone(),
            self.bid_qty.clone(),
            self.ask_price.clone(),
            self.ask_qty.clone(),
            self.open_price.clone(),
            self.high_price.clone(),
            self.low_price.clone(),
            self.total_traded_volume.clone(),
            self.total_traded_quote_volume.clone(),
            self.open_time.to_string(),
            self.close_time.to_string(),
            self.first_trade_id.to_string(),
            self.last_trade_id.to_string(),
            self.total_trades.to_string(),
        ]
    }
}

// ---------------------------------------------------------------------------
// DepthSnapshot (partial order book)
// ---------------------------------------------------------------------------

/// One price level as delivered (`["price", "qty"]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: String,
    pub volume: String,
}

impl PriceLevel {
    pub fn new(price: impl Into<String>, volume: impl Into<String>) -> Self {
        Self { price: price.into(), volume: volume.into() }
    }
}

/// Top-N order book capture.
///
/// `asks[0]` is the best (lowest) ask, `bids[0]` the best (highest) bid.
/// Both sides hold at most `levels` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSnapshot {
    /// Local capture time, ms since Unix epoch.
    pub captured_at_ms: u64,
    pub symbol: Instrument,
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
    levels: usize,
}

impl DepthSnapshot {
    /// Build a snapshot, dropping levels beyond `levels`.
    pub fn new(
        captured_at_ms: u64,
        symbol: Instrument,
        mut asks: Vec<PriceLevel>,
        mut bids: Vec<PriceLevel>,
        levels: usize,
    ) -> Self {
        asks.truncate(levels);
        bids.truncate(levels);
        Self { captured_at_ms, symbol, asks, bids, levels }
    }
}

/// Depth log header for `levels` levels per side.
pub fn depth_columns(levels: usize) -> Vec<String> {
    let mut cols = Vec::with_capacity(2 + 4 * levels);
    cols.push("Timestamp".to_string());
    cols.push("Symbol".to_string());
    for prefix in ["AV", "AP", "BV", "BP"] {
        cols.extend((1..=levels).map(|i| format!("{prefix}{i}")));
    }
    cols
}

/// Append one column block, padding missing levels with empty cells.
fn push_side(out: &mut Vec<String>, side: &[PriceLevel], levels: usize, pick: fn(&PriceLevel) -> &str) {
    for i in 0..levels {
        out.push(side.get(i).map(|l| pick(l).to_string()).unwrap_or_default());
    }
}

impl Record for DepthSnapshot {
    fn symbol(&self) -> &str {
        self.symbol.as_str()
    }

    fn fields(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(2 + 4 * self.levels);
        out.push(self.captured_at_ms.to_string());
        out.push(self.symbol.to_string());
        push_side(&mut out, &self.asks, self.levels, |l| &l.volume);
        push_side(&mut out, &self.asks, self.levels, |l| &l.price);
        push_side(&mut out, &self.bids, self.levels, |l| &l.volume);
        push_side(&mut out, &self.bids, self.levels, |l| &l.price);
        out
    }
}
