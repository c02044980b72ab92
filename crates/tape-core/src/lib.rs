//! # tape-core
//!
//! Core crate for the tape market-data recorder, providing:
//!
//! - **Types** (`types`): instruments and the ticker/depth record shapes
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `RecorderError` via thiserror
//! - **Feed** (`feed`): the streaming transport capability
//! - **WebSocket** (`ws`): tokio-tungstenite implementation of the feed
//! - **Writer** (`writer`): append-only, header-once row logs (plain or gzip)
//! - **Guard** (`guard`): single-instance marker files
//! - **Time utilities** (`time_util`): wall-clock timestamps
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod feed;
pub mod guard;
pub mod logging;
pub mod time_util;
pub mod types;
pub mod writer;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
