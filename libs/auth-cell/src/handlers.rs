use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use tracing::debug;

use shared_models::auth::{SessionStatusResponse, SignInCredentials};
use shared_models::error::AppError;

use crate::{AuthError, AuthenticatedClient};

fn to_app_error(err: AuthError) -> AppError {
    match err {
        AuthError::LoggedOut => AppError::Auth(err.to_string()),
        AuthError::Store(msg) => AppError::Internal(msg),
        other => AppError::ExternalService(other.to_string()),
    }
}

pub async fn get_session(
    State(client): State<Arc<AuthenticatedClient>>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    debug!("Reading session status");

    let signed_in = client.is_signed_in().await.map_err(to_app_error)?;
    let user_id = client.user_id().await.map_err(to_app_error)?;

    Ok(Json(SessionStatusResponse { signed_in, user_id }))
}

pub async fn create_session(
    State(client): State<Arc<AuthenticatedClient>>,
    Json(credentials): Json<SignInCredentials>,
) -> Result<StatusCode, AppError> {
    if credentials.access_token.trim().is_empty() || credentials.refresh_token.trim().is_empty() {
        return Err(AppError::BadRequest("access_token and refresh_token are required".to_string()));
    }

    client.sign_in(&credentials).await.map_err(to_app_error)?;
    Ok(StatusCode::CREATED)
}

pub async fn delete_session(
    State(client): State<Arc<AuthenticatedClient>>,
) -> Result<StatusCode, AppError> {
    client.sign_out().await.map_err(to_app_error)?;
    Ok(StatusCode::NO_CONTENT)
}
