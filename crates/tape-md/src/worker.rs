//! Stream worker: classify each feed message and act on it.
//!
//! One worker runs per live subscription. For every text frame it:
//!
//! ```text
//! frame ──► JSON ──► [array? split] ──► Classifier ──┬─ Update       ──► RowSink + health
//!                                                    ├─ Error        ──► log + health
//!                                                    ├─ Ack          ──► debug log
//!                                                    └─ Unrecognized ──► warn log
//! ```
//!
//! A frame that is not JSON at all is treated as a transport fault and ends
//! the session; the supervisor reconnects.

use tape_core::error::RecorderError;
use tape_core::feed::Subscription;
use tape_core::types::Record;
use tape_core::writer::RowSink;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::health::{HealthEvent, HealthReporter};

/// Outcome of classifying one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified<R> {
    /// A data update to persist.
    Update(R),
    /// The feed reported an error; the string describes it.
    Error(String),
    /// Subscription acknowledgement.
    Ack,
    /// Anything else; carries the event tag (or a placeholder).
    Unrecognized(String),
}

/// Exchange-specific message interpretation for one pipeline.
pub trait Classifier: Send + Sync + 'static {
    type Record: Record + Send;

    /// Log header for the records this classifier produces.
    fn header(&self) -> Vec<String>;

    fn classify(&self, msg: &serde_json::Value) -> Classified<Self::Record>;
}

/// Per-frame tallies, mostly for tests and debug logs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameSummary {
    pub accepted: u64,
    pub errors: u64,
    pub acks: u64,
    pub unrecognized: u64,
}

/// Drives one subscription into one sink.
pub struct StreamWorker<'a, C, W> {
    label: &'a str,
    classifier: &'a C,
    sink: &'a mut W,
    health: &'a mut HealthReporter,
    frames: u64,
}

impl<'a, C: Classifier, W: RowSink> StreamWorker<'a, C, W> {
    pub fn new(
        label: &'a str,
        classifier: &'a C,
        sink: &'a mut W,
        health: &'a mut HealthReporter,
    ) -> Self {
        Self { label, classifier, sink, health, frames: 0 }
    }

    /// Frames received by this worker.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Process one raw text frame.
    pub fn handle_frame(&mut self, text: &str) -> Result<FrameSummary, RecorderError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            RecorderError::Transport(format!("malformed frame ({e}): {}", truncate(text)))
        })?;

        let mut summary = FrameSummary::default();
        match value {
            serde_json::Value::Array(items) => {
                for item in &items {
                    self.handle_message(item, &mut summary)?;
                }
            }
            other => self.handle_message(&other, &mut summary)?,
        }
        Ok(summary)
    }

    fn handle_message(
        &mut self,
        msg: &serde_json::Value,
        summary: &mut FrameSummary,
    ) -> Result<(), RecorderError> {
        match self.classifier.classify(msg) {
            Classified::Update(record) => {
                self.sink.append(&record.fields())?;
                self.health.record(HealthEvent::Accepted);
                self.health.record(HealthEvent::Seen(record.symbol()));
                summary.accepted += 1;
            }
            Classified::Error(reason) => {
                error!("[feed-error:{}] {reason}: {}", self.label, truncate(&msg.to_string()));
                self.health.record(HealthEvent::Error);
                summary.errors += 1;
            }
            Classified::Ack => {
                debug!("[{}] ack: {msg}", self.label);
                summary.acks += 1;
            }
            Classified::Unrecognized(tag) => {
                warn!(
                    "[unrecognized:{}] event={tag}: {}",
                    self.label,
                    truncate(&msg.to_string())
                );
                summary.unrecognized += 1;
            }
        }
        Ok(())
    }

    /// Consume frames until the subscription or the sink fails.
    pub async fn run<S: Subscription>(&mut self, sub: &mut S) -> RecorderError {
        loop {
            let frame = match sub.recv_next().await {
                Ok(frame) => frame,
                Err(e) => return e,
            };
            self.frames += 1;
            if let Err(e) = self.handle_frame(&frame) {
                return e;
            }
            self.health.maybe_report(Instant::now());
        }
    }
}

/// Keep raw payloads in logs readable.
fn truncate(s: &str) -> &str {
    const MAX: usize = 512;
    if s.len() <= MAX {
        return s;
    }
    let mut end = MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
