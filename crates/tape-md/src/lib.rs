//! # tape-md
//!
//! Market data recording pipelines.
//!
//! ## Architecture
//!
//! Each pipeline kind (ticker, depth) is a [`fleet::Fleet`] of supervised
//! [`pipeline::StreamPipeline`]s wrapped in a [`RecorderModule`] the runner
//! starts and stops. The exchange module ([`binance`]) only describes the
//! streams and how to classify their messages; the generic engine handles
//! connecting, writing, health accounting and reconnects.
//!
//! ## Shared infrastructure
//!
//! - [`worker`]: classify frames, append rows, count
//! - [`health`]: window/lifetime counters and periodic reports
//! - [`supervisor`]: reconnect state machine with exponential backoff
//! - [`pipeline`]: feed + writer + health as one reconnectable unit
//! - [`fleet`]: one supervised task per member, panic respawn
//! - [`json_util`]: JSON parsing helpers

pub mod binance;
pub mod fleet;
pub mod health;
pub mod json_util;
pub mod pipeline;
pub mod registry;
pub mod supervisor;
pub mod worker;

#[cfg(test)]
mod test_support;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

/// Trait implemented by all recorder modules.
///
/// Only `Send` is required (not `Sync`) because modules are accessed
/// sequentially by the runner, never concurrently.
#[async_trait]
pub trait RecorderModule: Send {
    /// Human-readable module name.
    fn name(&self) -> &str;
    /// Single-instance marker the runner must hold while this module runs.
    fn lock_path(&self) -> &Path;
    /// Spawn the module's tasks.
    async fn start(&mut self) -> Result<()>;
    /// Stop all connections and tasks.
    async fn stop(&mut self) -> Result<()>;
}
