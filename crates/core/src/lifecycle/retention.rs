//! Expiry of finished submissions.
//!
//! Only terminal submissions are ever purged; a chain in flight is never
//! pulled out from under its manager.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SubmissionsConfig;
use crate::metrics;
use crate::submission::{SubmissionError, SubmissionStore};

/// How long finished submissions are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Duration,
}

impl RetentionPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    /// `None` when retention is disabled (no `retention_hours`).
    /// Hour counts too large for a `Duration` in seconds saturate.
    pub fn from_config(config: &SubmissionsConfig) -> Option<Self> {
        config
            .retention_hours
            .map(|hours| Self::new(Duration::from_secs(hours.saturating_mul(3600))))
    }

    /// Submissions last updated before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.max_age)
            .ok()
            .and_then(|max_age| now.checked_sub_signed(max_age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Periodically purges expired submissions from the store.
pub struct RetentionSweeper {
    store: Arc<dyn SubmissionStore>,
    policy: RetentionPolicy,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        policy: RetentionPolicy,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            interval,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Purge once, as of `now`. Returns the number of deleted submissions.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> Result<usize, SubmissionError> {
        let cutoff = self.policy.cutoff(now);
        let purged = self.store.purge_finished_before(cutoff)?;

        metrics::SUBMISSIONS_PURGED.inc_by(purged as u64);
        if purged > 0 {
            info!(purged, cutoff = %cutoff, "Purged expired submissions");
        } else {
            debug!(cutoff = %cutoff, "No expired submissions");
        }
        Ok(purged)
    }

    /// Sweep on every interval tick until a shutdown signal arrives.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            max_age_secs = self.policy.max_age.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Retention sweeper started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Retention sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once(Utc::now()) {
                        warn!("Retention sweep failed: {}", e);
                    }
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self, shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown_rx))
    }
}
