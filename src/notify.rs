//! Webhook notification queue
//!
//! Events are enqueued by the rest of the control plane and flushed to the
//! configured webhook in batches. Failed deliveries are retried a bounded
//! number of times at a fixed interval, then dropped with a log line.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Notify;

use crate::models::UserStatus;
use crate::settings::Settings;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Event {
    UserStatusChanged {
        username: String,
        status: UserStatus,
    },
    UserCreated {
        username: String,
    },
    UserDeleted {
        username: String,
    },
    NodeStatusChanged {
        node_id: u64,
        healthy: bool,
    },
    ReachedUsagePercent {
        username: String,
        used_percent: f64,
    },
}

#[derive(Debug, Clone, Serialize)]
struct QueuedEvent {
    #[serde(flatten)]
    event: Event,
    enqueued_at: i64,
    #[serde(skip)]
    tries: u32,
}

pub struct Notifier {
    client: reqwest::Client,
    queue: Mutex<VecDeque<QueuedEvent>>,
    shutdown: Notify,
}

impl Notifier {
    pub fn new() -> Self {
        // HTTP/2 keep-alive so the flush loop reuses one connection
        let timeout = Settings::current().webhook_timeout;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .http2_keep_alive_interval(Some(Duration::from_secs(15)))
            .build()
            .unwrap_or_default();
        Notifier {
            client,
            queue: Mutex::new(VecDeque::new()),
            shutdown: Notify::new(),
        }
    }

    pub fn enqueue(&self, event: Event) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.push_back(QueuedEvent {
            event,
            enqueued_at: Utc::now().timestamp(),
            tries: 0,
        });
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn drain(&self) -> Vec<QueuedEvent> {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.drain(..).collect()
    }

    fn requeue(&self, events: Vec<QueuedEvent>) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        for event in events {
            queue.push_back(event);
        }
    }

    /// Deliver everything currently queued. Returns the number of events
    /// still pending afterwards.
    pub async fn flush(&self) -> usize {
        let settings = Settings::current();
        let url = settings.webhook_url.clone();
        if url.is_empty() {
            // No webhook configured, drop silently
            let dropped = self.drain();
            if !dropped.is_empty() {
                debug!("dropping {} events, no webhook configured", dropped.len());
            }
            return 0;
        }
        let max_retries = settings.notification_max_retries;

        let batch = self.drain();
        if batch.is_empty() {
            return 0;
        }

        let payload: Vec<Value> = batch
            .iter()
            .map(|e| serde_json::to_value(e).unwrap_or(Value::Null))
            .collect();
        let sent = match self.client.post(&url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("webhook returned {}", resp.status());
                false
            }
            Err(err) => {
                warn!("webhook delivery failed: {}", err);
                false
            }
        };

        if sent {
            info!("delivered {} events to webhook", batch.len());
            return self.pending();
        }

        let mut retry = Vec::new();
        for mut event in batch {
            event.tries += 1;
            if event.tries > max_retries {
                error!("dropping event after {} tries: {:?}", event.tries, event.event);
            } else {
                retry.push(event);
            }
        }
        self.requeue(retry);
        self.pending()
    }

    /// Flush on a fixed cadence until shutdown, then one final flush.
    pub async fn run(&self) {
        let interval = {
            let settings = Settings::current();
            Duration::from_secs(settings.notification_retry_interval)
        };
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush().await;
                }
                _ = self.shutdown.notified() => break,
            }
        }
        self.flush().await;
        info!("notification loop stopped");
    }

    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Notifier::new()
    }
}
