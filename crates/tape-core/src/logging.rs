//! Logging initialization using the `tracing` ecosystem.
//!
//! Provides:
//! - Console output (colored, human-readable)
//! - Optional file output (daily rotation via `tracing-appender`), as text
//!   or as one JSON object per line
//! - Configurable log level via env var `RUST_LOG` or explicit parameter
//!
//! Operator-facing lines carry a bracketed prefix per message kind
//! (`[health:..]`, `[reconnect:..]`, `[feed-error:..]`, ...) so they can be
//! grepped out of either sink.

use serde::Deserialize;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Encoding of the rotating log file. The console is always text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Initialize the global tracing subscriber.
///
/// Should be called once at program start.
///
/// # Parameters
///
/// - `log_level`: default level if `RUST_LOG` env var is not set (e.g. `"info"`)
/// - `log_dir`: optional directory for daily-rotating log files
/// - `module_name`: used as the log file prefix (e.g. `"tape"`)
/// - `file_format`: encoding of the file sink
pub fn init_logging(
    log_level: &str,
    log_dir: Option<&str>,
    module_name: &str,
    file_format: LogFormat,
) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let file_layer = log_dir.map(|dir| {
        let file_appender = tracing_appender::rolling::daily(dir, module_name);
        match file_format {
            LogFormat::Text => fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(file_appender)
                .with_current_span(false)
                .boxed(),
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_config_text() {
        let f: LogFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(f, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Text);
        assert!(serde_json::from_str::<LogFormat>(r#""xml""#).is_err());
    }
}
