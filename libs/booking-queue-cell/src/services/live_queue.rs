use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use auth_cell::{AuthError, AuthenticatedClient};
use doctor_cell::{AvailabilityService, AvailabilityWindow, Session, SessionResolver};
use shared_config::{AppConfig, StaleQueuePolicy, WaitingFilter};
use shared_utils::Clock;

use crate::services::{
    announcer::AnnouncementService,
    booking::BookingService,
    notifications::QueueNotificationService,
    poller::PollTask,
    queue::{classify, visible_bookings},
};
use crate::{
    Booking, BookingQueueError, BookingStatus, CalledPatient, DisplayState, QueueClassification, QueueView,
    RefreshOutcome,
};

/// Queue behaviour taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    pub resolver: SessionResolver,
    pub waiting_filter: WaitingFilter,
    pub stale_queue_policy: StaleQueuePolicy,
    pub next_in_queue_limit: usize,
    pub poll_interval_ms: u64,
    /// How long a call-next waits for an in-flight poll tick.
    pub call_wait_ms: u64,
}

impl QueueSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            resolver: SessionResolver::from_config(config),
            waiting_filter: config.waiting_filter,
            stale_queue_policy: config.stale_queue_policy,
            next_in_queue_limit: config.next_in_queue_limit,
            poll_interval_ms: config.poll_interval_ms,
            call_wait_ms: config.call_next_wait_ms,
        }
    }
}

/// Everything a display needs besides its hospital and mapping ids.
#[derive(Clone)]
pub struct QueueContext {
    pub client: Arc<AuthenticatedClient>,
    pub clock: Arc<dyn Clock>,
    pub notifications: Arc<QueueNotificationService>,
    pub announcements: AnnouncementService,
    pub settings: QueueSettings,
}

impl QueueContext {
    pub fn new(
        client: Arc<AuthenticatedClient>,
        clock: Arc<dyn Clock>,
        announcements: AnnouncementService,
        config: &AppConfig,
    ) -> Self {
        Self {
            client,
            clock,
            notifications: Arc::new(QueueNotificationService::new()),
            announcements,
            settings: QueueSettings::from_config(config),
        }
    }
}

struct QueueState {
    loaded: bool,
    signed_out: bool,
    doctor_name: Option<String>,
    windows: Vec<AvailabilityWindow>,
    selected_date: NaiveDate,
    session: Option<Session>,
    /// Visible bookings, token order.
    bookings: Vec<Booking>,
    last_updated: Option<NaiveDateTime>,
}

/// Live queue of one doctor mapping: availability, session and the latest
/// booking snapshot.
pub struct LiveQueue {
    hospital_id: String,
    mapping_id: String,
    availability: AvailabilityService,
    bookings: BookingService,
    context: QueueContext,
    state: RwLock<QueueState>,
    /// Held for the whole of a call-next; a second caller is turned away.
    call_lock: Mutex<()>,
    /// Poll ticks take it shared and skip when a call-next holds it.
    action_gate: RwLock<()>,
}

impl LiveQueue {
    pub fn new(hospital_id: impl Into<String>, mapping_id: impl Into<String>, context: QueueContext) -> Self {
        let today = context.clock.now().date();

        Self {
            hospital_id: hospital_id.into(),
            mapping_id: mapping_id.into(),
            availability: AvailabilityService::new(context.client.clone()),
            bookings: BookingService::new(context.client.clone()),
            state: RwLock::new(QueueState {
                loaded: false,
                signed_out: false,
                doctor_name: None,
                windows: Vec::new(),
                selected_date: today,
                session: None,
                bookings: Vec::new(),
                last_updated: None,
            }),
            context,
            call_lock: Mutex::new(()),
            action_gate: RwLock::new(()),
        }
    }

    pub fn hospital_id(&self) -> &str {
        &self.hospital_id
    }

    pub fn mapping_id(&self) -> &str {
        &self.mapping_id
    }

    /// Fetches doctor and availability, resolves the session and, when it is
    /// live, takes a first booking snapshot.
    #[instrument(skip(self, shutdown), fields(mapping_id = %self.mapping_id))]
    pub async fn load(&self, shutdown: &watch::Receiver<bool>) -> Result<(), BookingQueueError> {
        let availability = match self.availability.get_doctor_availability(&self.mapping_id).await {
            Ok(availability) => availability,
            Err(e) => return Err(self.availability_failed(e).await),
        };

        let now = self.context.clock.now();
        let session = self.context.settings.resolver.resolve(&availability.doctor_availability, now);

        {
            let mut state = self.state.write().await;
            state.loaded = true;
            state.signed_out = false;
            state.doctor_name = Some(availability.doctor_details.full_name);
            state.windows = availability.doctor_availability;
            state.bookings.clear();
            state.session = session;
        }

        info!("Display loaded for mapping {}", self.mapping_id);
        self.refresh_queue(shutdown).await;
        Ok(())
    }

    /// Switches the booking date and re-resolves the session.
    pub async fn set_selected_date(&self, date: NaiveDate, shutdown: &watch::Receiver<bool>) -> RefreshOutcome {
        {
            let mut state = self.state.write().await;
            let now = self.context.clock.now();
            state.session = self.context.settings.resolver.resolve(&state.windows, now);
            state.selected_date = date;
            state.bookings.clear();
            state.last_updated = None;
        }

        info!("Selected date for mapping {} is now {}", self.mapping_id, date);
        self.refresh_queue(shutdown).await
    }

    /// Fetches the booking list for the live session and commits it.
    ///
    /// Nothing is requested when no session is live. The response is
    /// dropped if `shutdown` fired, the session or date changed, or the
    /// session ended while the request was in flight.
    pub async fn refresh_queue(&self, shutdown: &watch::Receiver<bool>) -> RefreshOutcome {
        if *shutdown.borrow() {
            return RefreshOutcome::Discarded;
        }

        let (session, date) = {
            let state = self.state.read().await;
            if state.signed_out {
                return RefreshOutcome::SignedOut;
            }
            let now = self.context.clock.now();
            match &state.session {
                Some(session) if session.is_active_at(now) => (session.clone(), state.selected_date),
                _ => return RefreshOutcome::Inactive,
            }
        };

        let result = self.bookings.list_bookings(&session.value, date).await;

        if let Err(BookingQueueError::Auth(AuthError::LoggedOut)) = &result {
            self.mark_signed_out().await;
            return RefreshOutcome::SignedOut;
        }

        if *shutdown.borrow() {
            debug!("Poller stopped while fetching mapping {}, discarding", self.mapping_id);
            return RefreshOutcome::Discarded;
        }

        let mut state = self.state.write().await;
        let now = self.context.clock.now();
        if state.signed_out
            || state.session.as_ref() != Some(&session)
            || state.selected_date != date
            || !session.is_active_at(now)
        {
            debug!("Session for mapping {} changed during fetch, discarding", self.mapping_id);
            return RefreshOutcome::Discarded;
        }

        match result {
            Ok(bookings) => {
                let visible = visible_bookings(bookings);
                let count = visible.len();
                state.bookings = visible;
                state.last_updated = Some(now);
                RefreshOutcome::Updated(count)
            }
            Err(e) => {
                warn!("Failed to refresh queue for mapping {}: {}", self.mapping_id, e);
                if self.context.settings.stale_queue_policy == StaleQueuePolicy::Clear {
                    state.bookings.clear();
                }
                RefreshOutcome::Failed
            }
        }
    }

    /// Completes the current patient (if any) and moves the first waiting
    /// patient in.
    #[instrument(skip(self, shutdown), fields(mapping_id = %self.mapping_id))]
    pub async fn call_next(&self, shutdown: &watch::Receiver<bool>) -> Result<CalledPatient, BookingQueueError> {
        let Ok(_call) = self.call_lock.try_lock() else {
            return Err(BookingQueueError::CallInProgress);
        };
        let wait = Duration::from_millis(self.context.settings.call_wait_ms);
        let Ok(gate) = tokio::time::timeout(wait, self.action_gate.write()).await else {
            warn!("Poll tick still running after {:?}, refusing call next", wait);
            return Err(BookingQueueError::CallInProgress);
        };

        let classification = {
            let state = self.state.read().await;
            if state.signed_out {
                return Err(BookingQueueError::SignedOut);
            }
            let now = self.context.clock.now();
            if !state.session.as_ref().is_some_and(|session| session.is_active_at(now)) {
                return Err(BookingQueueError::NoActiveSession);
            }
            self.classify(&state)
        };

        let next = classification
            .next_patient()
            .cloned()
            .ok_or(BookingQueueError::NoWaitingPatient)?;

        // A failed completion is reported but the next patient is still called.
        let mut completed = None;
        if let Some(current) = classification.current_patient() {
            match self.bookings.update_status(current.booking_id, BookingStatus::Completed).await {
                Ok(()) => completed = Some(current.clone()),
                Err(e) => {
                    if let BookingQueueError::SignedOut = self.call_failed(e).await {
                        return Err(BookingQueueError::SignedOut);
                    }
                }
            }
        }

        if let Err(e) = self.bookings.update_status(next.booking_id, BookingStatus::InProgress).await {
            return Err(self.call_failed(e).await);
        }

        info!("Called token {} ({})", next.token_number, next.booking_id);
        self.context.notifications.notify_patient_called(&self.mapping_id, &next);
        self.context.announcements.announce_next_patient(&next.full_name);

        drop(gate);
        self.refresh_queue(shutdown).await;

        Ok(CalledPatient {
            called: next,
            completed,
        })
    }

    pub async fn view(&self) -> QueueView {
        let state = self.state.read().await;
        let now = self.context.clock.now();

        let display_state = if state.signed_out {
            DisplayState::SignedOut
        } else if !state.loaded {
            DisplayState::Loading
        } else if !state.session.as_ref().is_some_and(|session| session.is_active_at(now)) {
            DisplayState::StartingSoon
        } else {
            let classification = self.classify(&state);
            if classification.on_going.is_empty() && classification.waiting.is_empty() {
                DisplayState::NoPatients
            } else {
                let can_call_next = !classification.waiting.is_empty() && self.call_lock.try_lock().is_ok();
                DisplayState::Live {
                    not_started: classification.on_going.is_empty(),
                    waiting_total: classification.waiting.len(),
                    on_going: classification.on_going,
                    next_in_queue: classification.next_in_queue,
                    can_call_next,
                }
            }
        };

        QueueView {
            hospital_id: self.hospital_id.clone(),
            mapping_id: self.mapping_id.clone(),
            doctor_name: state.doctor_name.clone(),
            selected_date: state.selected_date,
            session: state.session.clone(),
            last_updated: state.last_updated,
            state: display_state,
        }
    }

    pub async fn classification(&self) -> QueueClassification {
        let state = self.state.read().await;
        self.classify(&state)
    }

    pub async fn is_signed_out(&self) -> bool {
        self.state.read().await.signed_out
    }

    /// Drops the snapshot and flags the display as signed out. Idempotent.
    pub async fn mark_signed_out(&self) {
        let mut state = self.state.write().await;
        if state.signed_out {
            return;
        }

        state.signed_out = true;
        state.bookings.clear();
        drop(state);

        info!("Display for mapping {} signed out", self.mapping_id);
        self.context.notifications.notify_signed_out(&self.mapping_id);
    }

    fn classify(&self, state: &QueueState) -> QueueClassification {
        let settings = &self.context.settings;
        classify(
            &state.bookings,
            state.session.as_ref(),
            settings.waiting_filter,
            settings.next_in_queue_limit,
        )
    }

    async fn call_failed(&self, err: BookingQueueError) -> BookingQueueError {
        if err.is_signed_out() {
            self.mark_signed_out().await;
            return BookingQueueError::SignedOut;
        }

        warn!("Call next failed for mapping {}: {}", self.mapping_id, err);
        self.context
            .notifications
            .notify_call_failed(&self.mapping_id, err.display_message());
        err
    }

    async fn availability_failed(&self, err: anyhow::Error) -> BookingQueueError {
        if let Some(AuthError::LoggedOut) = err.downcast_ref::<AuthError>() {
            self.mark_signed_out().await;
            return BookingQueueError::SignedOut;
        }

        warn!("Availability fetch failed for mapping {}: {}", self.mapping_id, err);
        BookingQueueError::Availability(err.to_string())
    }
}

#[async_trait]
impl PollTask for LiveQueue {
    #[instrument(skip_all, fields(mapping_id = %self.mapping_id))]
    async fn tick(&self, shutdown: &watch::Receiver<bool>) {
        let Ok(_gate) = self.action_gate.try_read() else {
            debug!("Call next in progress, skipping tick");
            return;
        };

        let outcome = self.refresh_queue(shutdown).await;
        debug!(?outcome, "Poll tick finished");
    }
}
