//! Feed-to-log pipeline.
//!
//! [`StreamPipeline`] is the [`Pipeline`] every recorder stream uses: one
//! feed subscription, one classifier, one output log, one health reporter.
//!
//! ```text
//! connect() ──► SchemaWriter::open ──► Feed::connect
//! run()     ──► StreamWorker::run   (until transport or persistence fault)
//! close()   ──► Subscription::close, writer dropped
//! ```
//!
//! The writer is reopened on every connect, which is also what makes a
//! persistence fault recoverable: the supervisor backs off and tries again.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tape_core::error::RecorderError;
use tape_core::feed::{Feed, StreamSpec, Subscription};
use tape_core::writer::{Compression, SchemaWriter};
use tracing::info;

use crate::health::HealthReporter;
use crate::supervisor::{Pipeline, SessionEnd};
use crate::worker::{Classifier, StreamWorker};

/// Where a pipeline writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub path: PathBuf,
    pub compression: Compression,
}

impl OutputSpec {
    /// Compression inferred from the file suffix.
    pub fn from_path(path: PathBuf) -> Self {
        let compression = Compression::from_path(&path);
        Self { path, compression }
    }
}

pub struct StreamPipeline<F: Feed, C: Classifier> {
    stream: StreamSpec,
    feed: Arc<F>,
    classifier: C,
    output: OutputSpec,
    health: HealthReporter,
}

/// Per-connection state.
pub struct StreamSession<S> {
    subscription: S,
    writer: SchemaWriter,
}

impl<F: Feed, C: Classifier> StreamPipeline<F, C> {
    pub fn new(
        stream: StreamSpec,
        feed: Arc<F>,
        classifier: C,
        output: OutputSpec,
        health: HealthReporter,
    ) -> Self {
        Self { stream, feed, classifier, output, health }
    }

    pub fn output(&self) -> &OutputSpec {
        &self.output
    }

    pub fn health(&self) -> &HealthReporter {
        &self.health
    }
}

#[async_trait]
impl<F: Feed, C: Classifier> Pipeline for StreamPipeline<F, C> {
    type Session = StreamSession<F::Subscription>;

    fn label(&self) -> &str {
        &self.stream.label
    }

    async fn connect(&mut self) -> Result<Self::Session, RecorderError> {
        let writer = SchemaWriter::open(
            &self.output.path,
            &self.classifier.header(),
            self.output.compression,
        )?;
        let subscription = self.feed.connect(&self.stream).await?;
        Ok(StreamSession { subscription, writer })
    }

    async fn run(&mut self, session: &mut Self::Session) -> SessionEnd {
        let mut worker = StreamWorker::new(
            &self.stream.label,
            &self.classifier,
            &mut session.writer,
            &mut self.health,
        );
        let error = worker.run(&mut session.subscription).await;
        SessionEnd { frames: worker.frames(), error }
    }

    async fn close(&mut self, mut session: Self::Session) {
        session.subscription.close().await;
        info!(
            "[{}] session closed, {} rows written to {}",
            self.stream.label,
            session.writer.rows_written(),
            session.writer.path().display()
        );
    }

    fn on_reconnect(&mut self) {
        self.health.record_reconnect();
    }
}
