//! Instrument identifiers.
//!
//! Exchange symbols are stored upper case (`BTCUSDT`), which is what the feed
//! echoes back in payloads and what the log rows carry. Stream names use the
//! lower-case form (`btcusdt@ticker`).

use std::fmt;

/// An exchange trading-pair code. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instrument(String);

impl Instrument {
    /// Build from any spelling; surrounding whitespace is trimmed.
    pub fn new(symbol: &str) -> Self {
        Self(symbol.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used in stream names.
    pub fn stream_name(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Parse a configured universe, dropping duplicates but keeping first-seen order.
pub fn instruments_from(symbols: &[String]) -> Vec<Instrument> {
    let mut out: Vec<Instrument> = Vec::with_capacity(symbols.len());
    for s in symbols {
        let inst = Instrument::new(s);
        if !inst.as_str().is_empty() && !out.contains(&inst) {
            out.push(inst);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_case_and_whitespace() {
        let inst = Instrument::new(" btcUsdt ");
        assert_eq!(inst.as_str(), "BTCUSDT");
        assert_eq!(inst.stream_name(), "btcusdt");
    }

    #[test]
    fn universe_dedups_in_order() {
        let syms = vec!["ETHUSDT".to_string(), "btcusdt".into(), "ethusdt".into(), "".into()];
        let out = instruments_from(&syms);
        assert_eq!(out, vec![Instrument::new("ETHUSDT"), Instrument::new("BTCUSDT")]);
    }
}
