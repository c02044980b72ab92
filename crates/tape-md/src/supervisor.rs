//! Reconnect supervisor.
//!
//! Wraps one [`Pipeline`] and keeps it alive forever:
//!
//! ```text
//!          ┌────────────── connect ok ──────────────┐
//!          │                                        ▼
//! CONNECTING ── connect err ──► FAILED ◄── session ends ── RUNNING
//!     ▲                            │
//!     └──────── delay elapsed ── BACKOFF
//! ```
//!
//! Every failure is retried; there is no terminal state. The delay grows
//! exponentially with consecutive failures and is capped. A session that
//! delivered at least one frame resets the failure count, so a link that
//! drops once a day reconnects after the base delay.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tape_core::config::ReconnectConfig;
use tape_core::error::RecorderError;
use tracing::{debug, info, warn};

/// Backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after the first failure. Doubles per consecutive failure.
    pub base_delay: Duration,
    /// Hard cap on any delay.
    pub max_delay: Duration,
    /// Add up to `base_delay / 2` of random delay, never exceeding `max_delay`.
    pub jitter: bool,
}

impl ReconnectPolicy {
    /// Same delay every time.
    pub fn fixed(delay: Duration) -> Self {
        Self { base_delay: delay, max_delay: delay, jitter: false }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            base_delay: config.effective_base_delay(),
            max_delay: config.effective_max_delay(),
            jitter: config.effective_jitter(),
        }
    }

    /// Delay before the next connect, given failures so far (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exp_delay = self.base_delay.checked_mul(multiplier).unwrap_or(self.max_delay);
        let capped = exp_delay.min(self.max_delay);

        if !self.jitter {
            return capped;
        }

        let jitter_range_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX) / 2;
        let remaining_ms =
            u64::try_from(self.max_delay.saturating_sub(capped).as_millis()).unwrap_or(0);
        let jitter_limit_ms = jitter_range_ms.min(remaining_ms);
        if jitter_limit_ms == 0 {
            return capped;
        }

        let jitter_ms = rand::thread_rng().gen_range(0..jitter_limit_ms);
        (capped + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Connecting,
    Running,
    Failed,
    Backoff,
}

/// How a live session ended.
#[derive(Debug)]
pub struct SessionEnd {
    /// Frames received during the session.
    pub frames: u64,
    pub error: RecorderError,
}

/// A connect/run/close cycle the supervisor can repeat.
///
/// State that must outlive one connection (health counters, the stream
/// definition) lives on the implementor; per-connection state lives in
/// `Session`.
#[async_trait]
pub trait Pipeline: Send + 'static {
    type Session: Send;

    fn label(&self) -> &str;

    async fn connect(&mut self) -> Result<Self::Session, RecorderError>;

    /// Run until the session fails. Never returns while it is healthy.
    async fn run(&mut self, session: &mut Self::Session) -> SessionEnd;

    async fn close(&mut self, session: Self::Session);

    /// Called once per failure, before the backoff delay.
    fn on_reconnect(&mut self) {}
}

/// Owns a pipeline and reconnects it indefinitely.
pub struct Supervisor<P> {
    pipeline: P,
    policy: ReconnectPolicy,
    state: SupervisorState,
    attempts: u64,
    consecutive_failures: u32,
}

impl<P: Pipeline> Supervisor<P> {
    pub fn new(pipeline: P, policy: ReconnectPolicy) -> Self {
        Self {
            pipeline,
            policy,
            state: SupervisorState::Connecting,
            attempts: 0,
            consecutive_failures: 0,
        }
    }

    fn transition(&mut self, next: SupervisorState) {
        debug!("[{}] {:?} -> {next:?}", self.pipeline.label(), self.state);
        self.state = next;
    }

    /// Run forever. Only task cancellation stops this.
    pub async fn run(mut self) -> Infallible {
        loop {
            self.transition(SupervisorState::Connecting);
            self.attempts += 1;

            let failure = match self.pipeline.connect().await {
                Ok(mut session) => {
                    self.transition(SupervisorState::Running);
                    info!("[{}] running (attempt {})", self.pipeline.label(), self.attempts);
                    let end = self.pipeline.run(&mut session).await;
                    self.transition(SupervisorState::Failed);
                    self.pipeline.close(session).await;
                    if end.frames > 0 {
                        self.consecutive_failures = 0;
                    }
                    end.error
                }
                Err(e) => {
                    self.transition(SupervisorState::Failed);
                    e
                }
            };

            let delay = self.policy.delay_for_attempt(self.consecutive_failures);
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.pipeline.on_reconnect();
            warn!(
                "[reconnect:{}] attempt {} failed ({}): {failure}; retrying in {:.1}s",
                self.pipeline.label(),
                self.attempts,
                failure.kind(),
                delay.as_secs_f64()
            );

            self.transition(SupervisorState::Backoff);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;

    #[test]
    fn delay_doubles_then_caps() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            jitter: false,
        };
        let delays: Vec<u64> = (0..6).map(|a| policy.delay_for_attempt(a).as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
        assert_eq!(policy.delay_for_attempt(200), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            jitter: true,
        };
        for _ in 0..100 {
            let d = policy.delay_for_attempt(0);
            assert!(d >= Duration::from_secs(5) && d < Duration::from_millis(7500));
            assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(60));
        }
    }

    #[test]
    fn fixed_policy_is_constant() {
        let policy = ReconnectPolicy::fixed(Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(7), Duration::from_secs(5));
    }

    /// Fails `connect` a scripted number of times, then runs sessions that
    /// deliver `frames` each and end.
    struct Flaky {
        connect_failures: u32,
        frames_per_session: u64,
        connects: Arc<Mutex<Vec<Instant>>>,
        reconnects: Arc<Mutex<u64>>,
    }

    #[async_trait]
    impl Pipeline for Flaky {
        type Session = ();

        fn label(&self) -> &str {
            "flaky"
        }

        async fn connect(&mut self) -> Result<(), RecorderError> {
            self.connects.lock().push(Instant::now());
            if self.connect_failures > 0 {
                self.connect_failures -= 1;
                return Err(RecorderError::Transport("refused".into()));
            }
            Ok(())
        }

        async fn run(&mut self, _session: &mut ()) -> SessionEnd {
            if self.frames_per_session == 0 {
                std::future::pending::<()>().await;
            }
            SessionEnd {
                frames: self.frames_per_session,
                error: RecorderError::Transport("dropped".into()),
            }
        }

        async fn close(&mut self, _session: ()) {}

        fn on_reconnect(&mut self) {
            *self.reconnects.lock() += 1;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn n_failures_then_success_makes_n_plus_one_connects() {
        let connects = Arc::new(Mutex::new(Vec::new()));
        let reconnects = Arc::new(Mutex::new(0));
        let pipeline = Flaky {
            connect_failures: 3,
            frames_per_session: 0,
            connects: connects.clone(),
            reconnects: reconnects.clone(),
        };
        let handle = tokio::spawn(
            Supervisor::new(pipeline, ReconnectPolicy::fixed(Duration::from_secs(5))).run(),
        );

        tokio::time::sleep(Duration::from_secs(3600)).await;

        let times = connects.lock().clone();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(5));
        }
        assert_eq!(*reconnects.lock(), 3);
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn productive_session_resets_backoff() {
        let connects = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Flaky {
            connect_failures: 0,
            frames_per_session: 10,
            connects: connects.clone(),
            reconnects: Arc::new(Mutex::new(0)),
        };
        let policy = ReconnectPolicy {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            jitter: false,
        };
        let handle = tokio::spawn(Supervisor::new(pipeline, policy).run());

        tokio::time::sleep(Duration::from_secs(21)).await;
        handle.abort();

        // Every session delivered frames, so the delay never grows past base.
        let times = connects.lock().clone();
        assert_eq!(times.len(), 5);
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_failures_back_off_exponentially() {
        let connects = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Flaky {
            connect_failures: u32::MAX,
            frames_per_session: 0,
            connects: connects.clone(),
            reconnects: Arc::new(Mutex::new(0)),
        };
        let policy = ReconnectPolicy {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            jitter: false,
        };
        let handle = tokio::spawn(Supervisor::new(pipeline, policy).run());

        tokio::time::sleep(Duration::from_secs(200)).await;
        handle.abort();

        let times = connects.lock().clone();
        let gaps: Vec<u64> = times.windows(2).map(|p| (p[1] - p[0]).as_secs()).collect();
        assert_eq!(gaps, vec![5, 10, 20, 40, 60, 60]);
    }
}
