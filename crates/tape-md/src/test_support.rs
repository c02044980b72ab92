//! Scripted feed and in-memory sink for unit tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tape_core::error::RecorderError;
use tape_core::feed::{Feed, StreamSpec, Subscription};
use tape_core::writer::RowSink;

/// One thing a scripted subscription does when asked for a frame.
#[derive(Debug, Clone)]
pub enum Step {
    Frame(String),
    Fail(String),
}

/// Plays back `steps`, then stays silent forever.
#[derive(Debug)]
pub struct ScriptedSubscription {
    steps: VecDeque<Step>,
}

impl ScriptedSubscription {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps: steps.into() }
    }
}

#[async_trait]
impl Subscription for ScriptedSubscription {
    async fn recv_next(&mut self) -> Result<String, RecorderError> {
        match self.steps.pop_front() {
            Some(Step::Frame(text)) => Ok(text),
            Some(Step::Fail(reason)) => Err(RecorderError::Transport(reason)),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}

/// Hands out one script per connect. `Err` scripts fail the connect itself;
/// once scripts run out every connection is silent.
#[derive(Debug, Default)]
pub struct ScriptedFeed {
    scripts: Mutex<VecDeque<Result<Vec<Step>, String>>>,
    connected: Mutex<Vec<StreamSpec>>,
}

impl ScriptedFeed {
    pub fn new(scripts: Vec<Result<Vec<Step>, String>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            connected: Mutex::new(Vec::new()),
        }
    }

    pub fn connects(&self) -> usize {
        self.connected.lock().len()
    }

    /// Specs passed to `connect`, in order.
    pub fn connected(&self) -> Vec<StreamSpec> {
        self.connected.lock().clone()
    }
}

#[async_trait]
impl Feed for ScriptedFeed {
    type Subscription = ScriptedSubscription;

    async fn connect(&self, spec: &StreamSpec) -> Result<ScriptedSubscription, RecorderError> {
        self.connected.lock().push(spec.clone());
        match self.scripts.lock().pop_front() {
            Some(Ok(steps)) => Ok(ScriptedSubscription::new(steps)),
            Some(Err(reason)) => Err(RecorderError::Transport(reason)),
            None => Ok(ScriptedSubscription::new(Vec::new())),
        }
    }
}

/// Collects rows in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub rows: Vec<Vec<String>>,
    pub fail: bool,
}

impl RowSink for VecSink {
    fn append(&mut self, fields: &[String]) -> Result<(), RecorderError> {
        if self.fail {
            return Err(RecorderError::Persistence("disk full".into()));
        }
        self.rows.push(fields.to_vec());
        Ok(())
    }
}

/// A `24hrTicker` payload for `symbol` with the given last price.
pub fn ticker_frame(symbol: &str, last_price: &str) -> String {
    serde_json::json!({
        "e": "24hrTicker", "E": 1672515782136u64, "s": symbol,
        "p": "0.0015", "P": "250.00", "w": "0.0018", "x": "0.0009",
        "c": last_price, "Q": "10", "b": "0.0024", "B": "10",
        "a": "0.0026", "A": "100", "o": "0.0010", "h": "0.0025",
        "l": "0.0010", "v": "10000", "q": "18",
        "O": 0, "C": 86400000, "F": 0, "L": 18150, "n": 18151
    })
    .to_string()
}

/// A partial-depth payload with `n` levels per side.
pub fn depth_frame(n: usize) -> String {
    let bids: Vec<[String; 2]> =
        (0..n).map(|i| [format!("{}.00", 100 - i), format!("{}", i + 1)]).collect();
    let asks: Vec<[String; 2]> =
        (0..n).map(|i| [format!("{}.00", 101 + i), format!("{}", i + 1)]).collect();
    serde_json::json!({ "lastUpdateId": 160, "bids": bids, "asks": asks }).to_string()
}
