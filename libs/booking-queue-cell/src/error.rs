use auth_cell::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingQueueError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Clinic API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed clinic API response: {0}")]
    Malformed(String),

    #[error("No patient is waiting")]
    NoWaitingPatient,

    #[error("Another call is already in progress")]
    CallInProgress,

    #[error("No session is active")]
    NoActiveSession,

    #[error("Signed out")]
    SignedOut,

    #[error("No display selected")]
    NoDisplay,

    #[error("Availability lookup failed: {0}")]
    Availability(String),

    #[error("Announcement failed: {0}")]
    Announcement(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BookingQueueError {
    pub fn is_signed_out(&self) -> bool {
        matches!(
            self,
            BookingQueueError::SignedOut | BookingQueueError::Auth(AuthError::LoggedOut)
        )
    }

    /// Text suitable for the error notification shown on the display.
    pub fn display_message(&self) -> String {
        match self {
            BookingQueueError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
