use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::Session;
use shared_models::de::optional_string_or_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum BookingStatus {
    Waiting,
    InProgress,
    Completed,
    /// Cancelled, no-show and any other code the display does not show.
    Other(i32),
}

impl BookingStatus {
    pub fn code(&self) -> i32 {
        match self {
            BookingStatus::Waiting => 1,
            BookingStatus::InProgress => 2,
            BookingStatus::Completed => 3,
            BookingStatus::Other(code) => *code,
        }
    }

    /// Only waiting and in-progress bookings reach the screen.
    pub fn is_visible(&self) -> bool {
        matches!(self, BookingStatus::Waiting | BookingStatus::InProgress)
    }
}

impl From<i32> for BookingStatus {
    fn from(code: i32) -> Self {
        match code {
            1 => BookingStatus::Waiting,
            2 => BookingStatus::InProgress,
            3 => BookingStatus::Completed,
            other => BookingStatus::Other(other),
        }
    }
}

impl From<BookingStatus> for i32 {
    fn from(status: BookingStatus) -> Self {
        status.code()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: i64,
    pub token_number: i64,
    pub full_name: String,
    pub status: BookingStatus,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub availability_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateBookingStatusRequest {
    pub booking_id: i64,
    pub status: BookingStatus,
}

/// Visible bookings split the way the screen shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueClassification {
    /// In-progress bookings. Normally one; all are kept if upstream reports more.
    pub on_going: Vec<Booking>,
    /// Waiting bookings in token order.
    pub waiting: Vec<Booking>,
    /// Head of `waiting`, as many as the screen lists.
    pub next_in_queue: Vec<Booking>,
}

impl QueueClassification {
    pub fn next_patient(&self) -> Option<&Booking> {
        self.waiting.first()
    }

    pub fn current_patient(&self) -> Option<&Booking> {
        self.on_going.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DisplayState {
    /// Availability has not been fetched yet.
    Loading,
    /// No session is live right now.
    StartingSoon,
    /// Session is live but nobody is waiting or being seen.
    NoPatients,
    Live {
        on_going: Vec<Booking>,
        /// Nobody is with the doctor yet.
        not_started: bool,
        next_in_queue: Vec<Booking>,
        waiting_total: usize,
        can_call_next: bool,
    },
    /// Credentials were torn down; sign in again.
    SignedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueView {
    pub hospital_id: String,
    pub mapping_id: String,
    pub doctor_name: Option<String>,
    pub selected_date: NaiveDate,
    pub session: Option<Session>,
    pub last_updated: Option<NaiveDateTime>,
    #[serde(flatten)]
    pub state: DisplayState,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalledPatient {
    pub called: Booking,
    pub completed: Option<Booking>,
}

/// Result of one attempt to refresh the displayed queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New snapshot committed with this many visible bookings.
    Updated(usize),
    /// Session not live; no request made.
    Inactive,
    /// Response arrived after the poller stopped or the session changed.
    Discarded,
    /// Request failed; the stale queue policy was applied.
    Failed,
    SignedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    PatientCalled {
        mapping_id: String,
        booking_id: i64,
        token_number: i64,
        full_name: String,
    },
    CallNextFailed {
        mapping_id: String,
        message: String,
    },
    SignedOut {
        mapping_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    pub poller_id: String,
    pub interval_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poller_id: format!("poller-{}", Uuid::new_v4()),
            interval_ms: 5000,
            shutdown_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectDisplayRequest {
    pub hospital_id: String,
    pub mapping_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectDateRequest {
    pub date: NaiveDate,
}
