use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Refresh failed and the stored credentials were torn down.
    #[error("Session expired, sign in again")]
    LoggedOut,

    #[error("Token refresh rejected with status {status}: {message}")]
    RefreshRejected { status: u16, message: String },

    #[error("Malformed refresh response: {0}")]
    MalformedRefresh(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Credential store error: {0}")]
    Store(String),
}

impl AuthError {
    pub fn is_logged_out(&self) -> bool {
        matches!(self, AuthError::LoggedOut)
    }
}
