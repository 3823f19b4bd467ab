//! Expired-user autodelete
//!
//! Users that stayed expired past the configured retention are removed by a
//! periodic sweep. The persistence layer does the actual delete; the job
//! computes the cutoff and emits `user_deleted` events for the removals.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::sync::Notify;

use crate::notify::{Event, Notifier};
use crate::settings::Settings;

const SECONDS_PER_DAY: i64 = 86_400;

/// Persistence collaborator that removes expired users. Implementations
/// delete every user whose expiry lies before `cutoff` and report the
/// removed usernames.
pub trait UserPruner: Send + Sync {
    fn delete_expired(
        &self,
        cutoff: i64,
    ) -> impl Future<Output = Result<Vec<String>, String>> + Send;
}

pub struct AutodeleteJob<P> {
    pruner: P,
    notifier: Arc<Notifier>,
    retention_days: i64,
    shutdown: Notify,
}

impl<P: UserPruner> AutodeleteJob<P> {
    /// `retention_days` counts from expiry to deletion; a negative value
    /// disables the job.
    pub fn new(pruner: P, notifier: Arc<Notifier>, retention_days: i64) -> Self {
        AutodeleteJob {
            pruner,
            notifier,
            retention_days,
            shutdown: Notify::new(),
        }
    }

    /// One sweep at `now`. Returns the number of users removed.
    pub async fn sweep(&self, now: i64) -> usize {
        if self.retention_days < 0 {
            return 0;
        }
        let cutoff = now - self.retention_days * SECONDS_PER_DAY;
        match self.pruner.delete_expired(cutoff).await {
            Ok(deleted) => {
                for username in &deleted {
                    self.notifier.enqueue(Event::UserDeleted {
                        username: username.clone(),
                    });
                }
                if !deleted.is_empty() {
                    info!("autodeleted {} expired user(s)", deleted.len());
                }
                deleted.len()
            }
            Err(err) => {
                error!("expired-user autodelete failed: {}", err);
                0
            }
        }
    }

    /// Sweep at the configured `user_autodelete_interval` until `stop` is
    /// called. Missed ticks coalesce into one.
    pub async fn run(&self) {
        let interval = Duration::from_secs(Settings::current().user_autodelete_interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep(chrono::Utc::now().timestamp()).await;
                }
                _ = self.shutdown.notified() => break,
            }
        }
        info!("autodelete loop stopped");
    }

    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }
}
