use std::sync::{Arc, Weak};

use chrono::NaiveDate;
use tokio::sync::{broadcast::error::RecvError, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use auth_cell::AuthEvent;

use crate::services::{
    live_queue::{LiveQueue, QueueContext},
    notifications::QueueEventReceiver,
    poller::QueuePoller,
};
use crate::{BookingQueueError, CalledPatient, PollerConfig, QueueView};

struct ActiveDisplay {
    queue: Arc<LiveQueue>,
    poller: QueuePoller,
}

/// Owns the display currently on screen. Selecting a new mapping tears the
/// old one down (poller stopped, in-flight fetches discarded) before a fresh
/// one is built.
pub struct DisplayService {
    context: QueueContext,
    active: Mutex<Option<ActiveDisplay>>,
}

impl DisplayService {
    pub fn new(context: QueueContext) -> Self {
        Self {
            context,
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> QueueEventReceiver {
        self.context.notifications.subscribe()
    }

    #[instrument(skip(self))]
    pub async fn select(&self, hospital_id: &str, mapping_id: &str) -> Result<QueueView, BookingQueueError> {
        let previous = self.active.lock().await.take();
        if let Some(previous) = previous {
            Self::teardown(previous).await;
        }

        let queue = Arc::new(LiveQueue::new(hospital_id, mapping_id, self.context.clone()));
        let mut poller = QueuePoller::new(PollerConfig {
            interval_ms: self.context.settings.poll_interval_ms,
            ..PollerConfig::default()
        });

        let loaded = queue.load(&poller.shutdown_signal()).await;
        match &loaded {
            Ok(()) => poller.start(queue.clone()),
            Err(e) => warn!("Display for mapping {} not polling: {}", mapping_id, e),
        }

        let replaced = self.active.lock().await.replace(ActiveDisplay {
            queue: queue.clone(),
            poller,
        });
        // Another select finished while this one was loading.
        if let Some(replaced) = replaced {
            Self::teardown(replaced).await;
        }

        loaded?;
        Ok(queue.view().await)
    }

    pub async fn current_view(&self) -> Result<QueueView, BookingQueueError> {
        let (queue, _) = self.current().await?;
        Ok(queue.view().await)
    }

    pub async fn call_next(&self) -> Result<CalledPatient, BookingQueueError> {
        let (queue, shutdown) = self.current().await?;
        queue.call_next(&shutdown).await
    }

    pub async fn set_selected_date(&self, date: NaiveDate) -> Result<QueueView, BookingQueueError> {
        let (queue, shutdown) = self.current().await?;
        queue.set_selected_date(date, &shutdown).await;
        Ok(queue.view().await)
    }

    /// Stops and forgets the current display. Returns whether one existed.
    pub async fn stop(&self) -> bool {
        let previous = self.active.lock().await.take();

        match previous {
            Some(current) => {
                Self::teardown(current).await;
                true
            }
            None => false,
        }
    }

    pub async fn is_polling(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|current| current.poller.is_running())
    }

    /// Follows sign-in and logout events from the authenticated client: a
    /// logout flags the display and stops its poller, a later sign-in
    /// rebuilds it for the same mapping.
    pub fn spawn_auth_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.context.client.subscribe();
        let service: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Auth listener skipped {} events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let Some(service) = service.upgrade() else {
                    break;
                };

                match event {
                    AuthEvent::LoggedOut { reason } => service.handle_logout(&reason).await,
                    AuthEvent::SignedIn { .. } => service.handle_sign_in().await,
                }
            }
        })
    }

    async fn handle_logout(&self, reason: &str) {
        let mut active = self.active.lock().await;
        let Some(current) = active.as_mut() else {
            return;
        };

        info!("Logged out ({}), stopping display for mapping {}", reason, current.queue.mapping_id());
        current.queue.mark_signed_out().await;
        current.poller.stop().await;
    }

    async fn teardown(mut previous: ActiveDisplay) {
        previous.poller.stop().await;
        info!("Stopped display for mapping {}", previous.queue.mapping_id());
    }

    async fn handle_sign_in(&self) {
        let Ok((queue, _)) = self.current().await else {
            return;
        };
        if !queue.is_signed_out().await {
            return;
        }

        info!("Signed in again, restarting display for mapping {}", queue.mapping_id());
        if let Err(e) = self.select(queue.hospital_id(), queue.mapping_id()).await {
            error!("Failed to restart display for mapping {}: {}", queue.mapping_id(), e);
        }
    }

    async fn current(&self) -> Result<(Arc<LiveQueue>, watch::Receiver<bool>), BookingQueueError> {
        let active = self.active.lock().await;
        active
            .as_ref()
            .map(|current| (current.queue.clone(), current.poller.shutdown_signal()))
            .ok_or(BookingQueueError::NoDisplay)
    }
}
