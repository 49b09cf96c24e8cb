use serde::Serialize;

/// Broadcast whenever the credential state changes in a way the display must
/// react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    SignedIn { user_id: Option<String> },
    /// Credentials are gone; the operator has to sign in again.
    LoggedOut { reason: String },
}
