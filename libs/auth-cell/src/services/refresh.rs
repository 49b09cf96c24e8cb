use std::sync::Arc;

use tracing::{debug, warn};

use shared_database::{ApiRequest, ClinicApiClient};
use shared_models::auth::{RefreshTokenRequest, TokenPair};

use crate::AuthError;

pub const REFRESH_TOKEN_PATH: &str = "/user/refresh-token";

/// Calls the token refresh endpoint. It is unauthenticated: the expiring
/// pair travels in the body.
pub struct TokenRefreshService {
    api: Arc<ClinicApiClient>,
}

impl TokenRefreshService {
    pub fn new(api: Arc<ClinicApiClient>) -> Self {
        Self { api }
    }

    pub async fn refresh(&self, access_token: &str, refresh_token: &str) -> Result<TokenPair, AuthError> {
        debug!("Requesting token refresh");

        let body = serde_json::to_value(RefreshTokenRequest {
            access_token,
            refresh_token,
        })
        .map_err(|e| AuthError::Transport(e.to_string()))?;
        let request = ApiRequest::post(REFRESH_TOKEN_PATH).json(body);

        let response = self
            .api
            .send(&request, None)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.is_success() {
            let message = response
                .error_message()
                .unwrap_or_else(|| "no error message".to_string());
            warn!("Token refresh rejected ({}): {}", response.status, message);
            return Err(AuthError::RefreshRejected {
                status: response.status.as_u16(),
                message,
            });
        }

        let pair: TokenPair = response
            .result()
            .map_err(|e| AuthError::MalformedRefresh(e.to_string()))?;

        if pair.access_token.is_empty() || pair.refresh_token.is_empty() {
            return Err(AuthError::MalformedRefresh("empty token in refresh response".to_string()));
        }

        Ok(pair)
    }
}
