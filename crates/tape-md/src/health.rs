//! Throughput and error accounting for one pipeline.
//!
//! A [`HealthReporter`] is owned by exactly one pipeline and mutated through
//! `&mut` by that pipeline's worker; nothing here is shared between tasks.
//! Counters come in two flavours: a window that is emptied at every report
//! and lifetime totals the window is folded into.
//!
//! Report cadence is measured from the previous report, not aligned to the
//! wall clock, so it drifts by however long the caller takes between
//! `maybe_report` calls.

use std::fmt;
use std::time::Duration;

use ahash::AHashMap;
use tokio::time::Instant;
use tracing::info;

/// Something a worker observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent<'a> {
    /// A data update was written.
    Accepted,
    /// The feed sent an error message.
    Error,
    /// A record for this instrument was seen.
    Seen(&'a str),
}

/// One emitted summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub window_accepted: u64,
    pub total_accepted: u64,
    pub window_errors: u64,
    pub total_errors: u64,
    pub distinct_symbols: usize,
    pub reconnects: u64,
    pub uptime: Duration,
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "updates={} (total={}) errors={} (total={}) symbols={} reconnects={} uptime={}s",
            self.window_accepted,
            self.total_accepted,
            self.window_errors,
            self.total_errors,
            self.distinct_symbols,
            self.reconnects,
            self.uptime.as_secs(),
        )
    }
}

/// Window + lifetime counters with a fixed report interval.
#[derive(Debug)]
pub struct HealthReporter {
    label: String,
    interval: Duration,
    started_at: Instant,
    last_report: Instant,
    window_accepted: u64,
    window_errors: u64,
    total_accepted: u64,
    total_errors: u64,
    reconnects: u64,
    seen: AHashMap<String, u64>,
}

impl HealthReporter {
    pub fn new(label: impl Into<String>, interval: Duration) -> Self {
        Self::starting_at(label, interval, Instant::now())
    }

    /// First report is due one `interval` after `now`.
    pub fn starting_at(label: impl Into<String>, interval: Duration, now: Instant) -> Self {
        Self {
            label: label.into(),
            interval,
            started_at: now,
            last_report: now,
            window_accepted: 0,
            window_errors: 0,
            total_accepted: 0,
            total_errors: 0,
            reconnects: 0,
            seen: AHashMap::new(),
        }
    }

    #[inline]
    pub fn record(&mut self, event: HealthEvent<'_>) {
        match event {
            HealthEvent::Accepted => self.window_accepted += 1,
            HealthEvent::Error => self.window_errors += 1,
            HealthEvent::Seen(symbol) => {
                if let Some(count) = self.seen.get_mut(symbol) {
                    *count += 1;
                } else {
                    self.seen.insert(symbol.to_string(), 1);
                }
            }
        }
    }

    pub fn record_reconnect(&mut self) {
        self.reconnects += 1;
    }

    /// Emit a summary if at least one interval passed since the last one.
    pub fn maybe_report(&mut self, now: Instant) -> Option<HealthReport> {
        if now.saturating_duration_since(self.last_report) < self.interval {
            return None;
        }

        self.total_accepted += self.window_accepted;
        self.total_errors += self.window_errors;

        let report = HealthReport {
            window_accepted: self.window_accepted,
            total_accepted: self.total_accepted,
            window_errors: self.window_errors,
            total_errors: self.total_errors,
            distinct_symbols: self.seen.len(),
            reconnects: self.reconnects,
            uptime: now.saturating_duration_since(self.started_at),
        };
        info!("[health:{}] {report}", self.label);

        self.last_report = now;
        self.window_accepted = 0;
        self.window_errors = 0;
        Some(report)
    }

    /// Lifetime observations for one instrument.
    pub fn seen_count(&self, symbol: &str) -> u64 {
        self.seen.get(symbol).copied().unwrap_or(0)
    }

    pub fn window_accepted(&self) -> u64 {
        self.window_accepted
    }

    pub fn window_errors(&self) -> u64 {
        self.window_errors
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(30);

    #[test]
    fn one_report_per_interval_then_window_resets() {
        let start = Instant::now();
        let mut health = HealthReporter::starting_at("ticker", INTERVAL, start);

        for _ in 0..7 {
            health.record(HealthEvent::Accepted);
            health.record(HealthEvent::Seen("BTCUSDT"));
        }
        for _ in 0..2 {
            health.record(HealthEvent::Error);
        }

        assert!(health.maybe_report(start + INTERVAL - Duration::from_millis(1)).is_none());

        let first = health.maybe_report(start + INTERVAL).unwrap();
        assert_eq!((first.window_accepted, first.window_errors), (7, 2));
        assert_eq!((first.total_accepted, first.total_errors), (7, 2));
        assert_eq!(first.distinct_symbols, 1);
        assert_eq!(first.uptime, INTERVAL);

        // Nothing more within the same interval.
        assert!(health.maybe_report(start + INTERVAL + Duration::from_secs(1)).is_none());

        let second = health.maybe_report(start + INTERVAL * 2).unwrap();
        assert_eq!((second.window_accepted, second.window_errors), (0, 0));
        assert_eq!((second.total_accepted, second.total_errors), (7, 2));
    }

    #[test]
    fn cadence_drifts_from_last_emission() {
        let start = Instant::now();
        let mut health = HealthReporter::starting_at("depth", INTERVAL, start);

        let late = start + INTERVAL + Duration::from_secs(5);
        assert!(health.maybe_report(late).is_some());
        // Next one is due 30s after the late emission, not at 60s.
        assert!(health.maybe_report(start + INTERVAL * 2).is_none());
        assert!(health.maybe_report(late + INTERVAL).is_some());
    }

    #[test]
    fn seen_counts_are_lifetime_per_symbol() {
        let start = Instant::now();
        let mut health = HealthReporter::starting_at("ticker", INTERVAL, start);
        health.record(HealthEvent::Seen("BTCUSDT"));
        health.record(HealthEvent::Seen("ETHUSDT"));
        health.record(HealthEvent::Seen("BTCUSDT"));
        health.maybe_report(start + INTERVAL);

        assert_eq!(health.seen_count("BTCUSDT"), 2);
        assert_eq!(health.seen_count("ETHUSDT"), 1);
        assert_eq!(health.seen_count("XRPUSDT"), 0);
    }

    #[test]
    fn report_includes_reconnects() {
        let start = Instant::now();
        let mut health = HealthReporter::starting_at("ticker", INTERVAL, start);
        health.record_reconnect();
        health.record_reconnect();
        let report = health.maybe_report(start + INTERVAL).unwrap();
        assert_eq!(report.reconnects, 2);
        assert!(report.to_string().contains("reconnects=2"));
    }
}
