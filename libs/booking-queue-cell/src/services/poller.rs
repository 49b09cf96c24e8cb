use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::PollerConfig;

/// Work run on every poll tick. `shutdown` flips to `true` once the poller
/// is stopped; results must not be committed after that.
#[async_trait]
pub trait PollTask: Send + Sync + 'static {
    async fn tick(&self, shutdown: &watch::Receiver<bool>);
}

/// Recurring task driving one [`PollTask`].
///
/// Ticks never overlap: the next one is scheduled a full interval after the
/// previous returns, so a slow tick is never followed by an immediate one. A poller is
/// single-use; build a new one for a new display.
pub struct QueuePoller {
    config: PollerConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handle: Option<JoinHandle<()>>,
}

impl QueuePoller {
    pub fn new(config: PollerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            shutdown_tx,
            shutdown_rx,
            handle: None,
        }
    }

    pub fn poller_id(&self) -> &str {
        &self.config.poller_id
    }

    /// Receiver that observes this poller's stop. Hand it to any fetch whose
    /// result belongs to the same display.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn start<T: PollTask>(&mut self, task: Arc<T>) {
        if self.handle.is_some() {
            warn!("Poller {} already started", self.config.poller_id);
            return;
        }
        if *self.shutdown_rx.borrow() {
            warn!("Poller {} was stopped and cannot restart", self.config.poller_id);
            return;
        }

        let poller_id = self.config.poller_id.clone();
        let period = Duration::from_millis(self.config.interval_ms.max(1));
        let shutdown = self.shutdown_rx.clone();
        let mut stop = self.shutdown_rx.clone();

        info!("Starting poller {} every {:?}", poller_id, period);

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the caller has just loaded.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        task.tick(&shutdown).await;
                        ticker.reset();
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Poller {} loop ended", poller_id);
        }));
    }

    /// Signals shutdown and waits for an in-flight tick to finish, aborting
    /// it after the configured timeout.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);

        let Some(mut handle) = self.handle.take() else {
            return;
        };

        let grace = Duration::from_millis(self.config.shutdown_timeout_ms);
        if timeout(grace, &mut handle).await.is_err() {
            warn!("Poller {} did not stop within {:?}, aborting", self.config.poller_id, grace);
            handle.abort();
        }

        info!("Poller {} stopped", self.config.poller_id);
    }
}

impl Drop for QueuePoller {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
