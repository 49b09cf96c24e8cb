use serde::{Deserialize, Serialize};

/// Access/refresh pair issued by the token refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Body of the token refresh request.
#[derive(Debug, Serialize)]
pub struct RefreshTokenRequest<'a> {
    pub access_token: &'a str,
    pub refresh_token: &'a str,
}

/// Credentials handed over by the sign-in flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub signed_in: bool,
    pub user_id: Option<String>,
}
