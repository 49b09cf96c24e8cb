use std::sync::Arc;

use chrono::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use shared_config::AppConfig;
use shared_database::{ApiRequest, ApiResponse, ClinicApiClient, CredentialKey, CredentialStore};
use shared_models::auth::{SignInCredentials, TokenPair};

use crate::{AuthError, AuthEvent, TokenRefreshService};

/// Sends clinic API requests with the stored access token, recovering from
/// an expired token with exactly one refresh and one retry.
///
/// Tokens are read from the store on every call; nothing is cached here, so
/// a refresh completed by another caller is picked up by the next request.
/// Two callers that hit an expired token at the same time each run their own
/// refresh.
pub struct AuthenticatedClient {
    api: Arc<ClinicApiClient>,
    store: Arc<dyn CredentialStore>,
    refresher: TokenRefreshService,
    credential_ttl: Duration,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthenticatedClient {
    pub fn new(api: Arc<ClinicApiClient>, store: Arc<dyn CredentialStore>, config: &AppConfig) -> Self {
        let (events, _) = broadcast::channel(16);

        Self {
            refresher: TokenRefreshService::new(api.clone()),
            api,
            store,
            credential_ttl: Duration::days(config.credential_ttl_days),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Sends `request`. Any status other than 401/403 is returned untouched;
    /// those two trigger the refresh path, after which the retry's response
    /// is returned whatever it is.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn request(&self, request: &ApiRequest) -> Result<ApiResponse, AuthError> {
        let access_token = self.read(CredentialKey::AccessToken).await?;

        let response = self
            .api
            .send(request, access_token.as_deref())
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.is_unauthorized() {
            return Ok(response);
        }

        info!("Access token rejected ({}), refreshing", response.status);

        let refresh_token = self.read(CredentialKey::RefreshToken).await?;
        let refreshed = self
            .refresher
            .refresh(
                access_token.as_deref().unwrap_or_default(),
                refresh_token.as_deref().unwrap_or_default(),
            )
            .await;

        let pair = match refreshed {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                self.expire_session(e.to_string()).await;
                return Err(AuthError::LoggedOut);
            }
        };

        self.store_tokens(&pair).await?;
        debug!("Tokens refreshed, retrying request once");

        self.api
            .send(request, Some(&pair.access_token))
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))
    }

    /// Persists credentials handed over by the sign-in flow.
    pub async fn sign_in(&self, credentials: &SignInCredentials) -> Result<(), AuthError> {
        self.store_tokens(&TokenPair {
            access_token: credentials.access_token.clone(),
            refresh_token: credentials.refresh_token.clone(),
        })
        .await?;

        if let Some(user_id) = &credentials.user_id {
            self.store
                .set(CredentialKey::UserId, user_id, self.credential_ttl)
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;
        }

        info!("Credentials stored for user {:?}", credentials.user_id);
        let _ = self.events.send(AuthEvent::SignedIn {
            user_id: credentials.user_id.clone(),
        });
        Ok(())
    }

    /// Explicit logout: same teardown as a failed refresh.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.store
            .clear()
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        info!("Signed out");
        let _ = self.events.send(AuthEvent::LoggedOut {
            reason: "signed out".to_string(),
        });
        Ok(())
    }

    pub async fn is_signed_in(&self) -> Result<bool, AuthError> {
        Ok(self.read(CredentialKey::AccessToken).await?.is_some()
            && self.read(CredentialKey::RefreshToken).await?.is_some())
    }

    pub async fn user_id(&self) -> Result<Option<String>, AuthError> {
        self.read(CredentialKey::UserId).await
    }

    async fn read(&self, key: CredentialKey) -> Result<Option<String>, AuthError> {
        self.store
            .get(key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))
    }

    async fn store_tokens(&self, pair: &TokenPair) -> Result<(), AuthError> {
        self.store
            .set(CredentialKey::AccessToken, &pair.access_token, self.credential_ttl)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        self.store
            .set(CredentialKey::RefreshToken, &pair.refresh_token, self.credential_ttl)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(())
    }

    async fn expire_session(&self, reason: String) {
        for key in CredentialKey::ALL {
            if let Err(e) = self.store.delete(key).await {
                error!("Failed to delete {} after refresh failure: {}", key, e);
            }
        }

        let _ = self.events.send(AuthEvent::LoggedOut { reason });
    }
}
