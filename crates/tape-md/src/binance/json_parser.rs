//! Binance JSON message classification and stream naming.
//!
//! Handles the raw-stream payloads the recorder subscribes to:
//! - `24hrTicker`: rolling 24h statistics, one per symbol per second
//! - partial depth (`<sym>@depth<L>`): top-L book snapshot, untagged,
//!   recognised by its `bids`/`asks` arrays
//!
//! Plus the control messages every stream can carry: subscription acks
//! (`{"result":null,"id":1}`) and errors (`{"e":"error",...}` or
//! `{"error":{"code":..,"msg":..}}`).

use serde::Deserialize;
use serde_json::Value;
use tape_core::time_util;
use tape_core::types::{DepthSnapshot, Instrument, TickerRecord, depth_columns};

use crate::json_util;
use crate::worker::{Classified, Classifier};

/// Partial book depths Binance publishes.
const STREAM_DEPTHS: [usize; 3] = [5, 10, 20];

/// Subscription acknowledgement: `result` present, with an `id`.
fn is_ack(v: &Value) -> bool {
    v.get("result").is_some() && v.get("id").is_some()
}

/// Description of an error message, if `v` is one.
fn error_description(v: &Value) -> Option<String> {
    if let Some(err) = v.get("error") {
        let code = err.get("code").map(Value::to_string).unwrap_or_default();
        let msg = err.get("msg").and_then(Value::as_str).unwrap_or("");
        return Some(format!("error {code} {msg}").trim_end().to_string());
    }
    if v.get("e").and_then(Value::as_str) == Some("error") {
        let msg = v.get("m").and_then(Value::as_str).unwrap_or("");
        return Some(format!("error event {msg}").trim_end().to_string());
    }
    None
}

fn event_tag(v: &Value) -> String {
    v.get("e")
        .and_then(Value::as_str)
        .unwrap_or("<untagged>")
        .to_string()
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// `24hrTicker` events become [`TickerRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickerClassifier;

impl Classifier for TickerClassifier {
    type Record = TickerRecord;

    fn header(&self) -> Vec<String> {
        TickerRecord::header()
    }

    fn classify(&self, msg: &Value) -> Classified<TickerRecord> {
        if is_ack(msg) {
            return Classified::Ack;
        }
        if let Some(desc) = error_description(msg) {
            return Classified::Error(desc);
        }
        match msg.get("e").and_then(Value::as_str) {
            Some("24hrTicker") => match TickerRecord::deserialize(msg) {
                Ok(record) => Classified::Update(record),
                Err(e) => Classified::Error(format!("undecodable 24hrTicker ({e})")),
            },
            _ => Classified::Unrecognized(event_tag(msg)),
        }
    }
}

/// SUBSCRIBE request for the ticker pipeline.
///
/// An empty universe subscribes to the all-market array stream.
pub fn build_ticker_subscribe(symbols: &[Instrument]) -> String {
    let params: Vec<String> = if symbols.is_empty() {
        vec!["!ticker@arr".to_string()]
    } else {
        symbols.iter().map(|s| format!("{}@ticker", s.stream_name())).collect()
    };
    serde_json::json!({
        "method": "SUBSCRIBE",
        "params": params,
        "id": 1
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Depth
// ---------------------------------------------------------------------------

/// Partial-depth snapshots for one symbol, truncated to `levels`.
///
/// The payload carries no symbol, so the classifier is bound to the symbol
/// its subscription was opened for. Capture time is local.
#[derive(Debug, Clone)]
pub struct DepthClassifier {
    symbol: Instrument,
    levels: usize,
}

impl DepthClassifier {
    pub fn new(symbol: Instrument, levels: usize) -> Self {
        Self { symbol, levels }
    }
}

impl Classifier for DepthClassifier {
    type Record = DepthSnapshot;

    fn header(&self) -> Vec<String> {
        depth_columns(self.levels)
    }

    fn classify(&self, msg: &Value) -> Classified<DepthSnapshot> {
        if is_ack(msg) {
            return Classified::Ack;
        }
        if let Some(desc) = error_description(msg) {
            return Classified::Error(desc);
        }

        let (Some(asks), Some(bids)) = (
            msg.get("asks").and_then(Value::as_array),
            msg.get("bids").and_then(Value::as_array),
        ) else {
            return Classified::Unrecognized(event_tag(msg));
        };

        let parsed = json_util::parse_levels(asks, self.levels)
            .and_then(|a| json_util::parse_levels(bids, self.levels).map(|b| (a, b)));
        match parsed {
            Ok((asks, bids)) => Classified::Update(DepthSnapshot::new(
                time_util::now_ms(),
                self.symbol.clone(),
                asks,
                bids,
                self.levels,
            )),
            Err(e) => Classified::Error(format!("undecodable depth snapshot ({e})")),
        }
    }
}

/// Smallest published depth covering `levels` (capped at 20).
pub fn depth_stream_levels(levels: usize) -> usize {
    STREAM_DEPTHS
        .iter()
        .copied()
        .find(|&d| d >= levels)
        .unwrap_or(STREAM_DEPTHS[STREAM_DEPTHS.len() - 1])
}

/// Raw-stream URL for one symbol's partial depth.
pub fn depth_stream_url(base: &str, symbol: &Instrument, levels: usize, update_speed_ms: u64) -> String {
    let speed = if update_speed_ms == 100 { "@100ms" } else { "" };
    format!(
        "{}/{}@depth{}{speed}",
        base.trim_end_matches('/'),
        symbol.stream_name(),
        depth_stream_levels(levels)
    )
}
