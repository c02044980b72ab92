//! Fleet coordinator: one supervised task per member key.
//!
//! ```text
//! Fleet::run ──► JoinSet
//!                 ├─ member "BTCUSDT" ── loop { Supervisor(factory("BTCUSDT")).run() }
//!                 ├─ member "ETHUSDT" ── loop { ... }
//!                 └─ ...
//! ```
//!
//! Members never finish on their own: the supervisor retries forever, and
//! a member whose pipeline panics is rebuilt from the factory. On shutdown
//! the fleet aborts every member and joins them, so all pipelines (and
//! their writers) are dropped before [`Fleet::run_until`] returns.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::RecorderModule;
use crate::supervisor::{Pipeline, ReconnectPolicy, Supervisor};

/// Builds a fresh pipeline for a member key.
pub type PipelineFactory<P> = Arc<dyn Fn(&str) -> P + Send + Sync>;

pub struct Fleet<P> {
    name: String,
    members: Vec<String>,
    policy: ReconnectPolicy,
    factory: PipelineFactory<P>,
}

impl<P: Pipeline> Fleet<P> {
    pub fn new(
        name: impl Into<String>,
        members: Vec<String>,
        policy: ReconnectPolicy,
        factory: impl Fn(&str) -> P + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            members,
            policy,
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn every member and wait on all of them.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Like [`Fleet::run`], until `shutdown` resolves. Members are then
    /// aborted and joined before this returns.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        let mut tasks = JoinSet::new();
        for member in &self.members {
            tasks.spawn(supervise_member(
                self.name.clone(),
                member.clone(),
                self.policy.clone(),
                self.factory.clone(),
            ));
        }
        info!("[fleet:{}] started {} members", self.name, self.members.len());

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    info!("[fleet:{}] all members stopped", self.name);
                    return;
                }
                res = tasks.join_next() => match res {
                    Some(Err(e)) if !e.is_cancelled() => {
                        error!("[fleet:{}] member task failed: {e}", self.name);
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }
        warn!("[fleet:{}] all members exited", self.name);
    }
}

async fn supervise_member<P: Pipeline>(
    fleet: String,
    member: String,
    policy: ReconnectPolicy,
    factory: PipelineFactory<P>,
) {
    let mut restarts = 0u64;
    loop {
        let supervisor = Supervisor::new(factory(member.as_str()), policy.clone());
        match AssertUnwindSafe(supervisor.run()).catch_unwind().await {
            Ok(never) => match never {},
            Err(_) => {
                restarts += 1;
                error!("[fleet:{fleet}] member {member} panicked; restarting (restart #{restarts})");
            }
        }
        // Same pacing as a failed connect, so a pipeline that panics at once
        // does not spin.
        tokio::time::sleep(policy.base_delay).await;
    }
}

/// [`RecorderModule`] that runs a [`Fleet`] on the tokio runtime.
pub struct FleetModule<P> {
    name: String,
    lock_path: PathBuf,
    fleet: Option<Fleet<P>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<P: Pipeline> FleetModule<P> {
    pub fn new(fleet: Fleet<P>, lock_path: PathBuf) -> Self {
        Self {
            name: fleet.name().to_string(),
            lock_path,
            fleet: Some(fleet),
            shutdown: None,
            task: None,
        }
    }
}

#[async_trait]
impl<P: Pipeline> RecorderModule for FleetModule<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn start(&mut self) -> Result<()> {
        let fleet = self
            .fleet
            .take()
            .ok_or_else(|| anyhow::anyhow!("module {} already started", self.name))?;
        let (tx, rx) = oneshot::channel();
        // A dropped sender also stops the fleet.
        self.task = Some(tokio::spawn(fleet.run_until(async move {
            let _ = rx.await;
        })));
        self.shutdown = Some(tx);
        info!("[{}] started", self.name);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            // The fleet joins its members before finishing, so every writer
            // is closed once this returns.
            if let Err(e) = task.await {
                warn!("[{}] fleet task ended abnormally: {e}", self.name);
            }
        }
        info!("[{}] stopped", self.name);
        Ok(())
    }
}
