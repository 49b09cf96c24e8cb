use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use tracing::{error, info};

use shared_models::error::AppError;

use crate::{BookingQueueError, CalledPatient, DisplayService, QueueView, SelectDateRequest, SelectDisplayRequest};

fn to_app_error(err: BookingQueueError) -> AppError {
    match err {
        BookingQueueError::NoDisplay => AppError::NotFound(err.to_string()),
        BookingQueueError::NoWaitingPatient
        | BookingQueueError::CallInProgress
        | BookingQueueError::NoActiveSession => AppError::Conflict(err.to_string()),
        ref e if e.is_signed_out() => AppError::Auth(err.to_string()),
        BookingQueueError::Api { message, .. } => AppError::ExternalService(message),
        BookingQueueError::Auth(_) | BookingQueueError::Availability(_) | BookingQueueError::Malformed(_) => {
            AppError::ExternalService(err.to_string())
        }
        other => {
            error!("Display operation failed: {}", other);
            AppError::Internal("Operation failed".to_string())
        }
    }
}

/// Select the hospital and doctor mapping to display
pub async fn select_display(
    State(service): State<Arc<DisplayService>>,
    Json(request): Json<SelectDisplayRequest>,
) -> Result<Json<QueueView>, AppError> {
    if request.hospital_id.trim().is_empty() || request.mapping_id.trim().is_empty() {
        return Err(AppError::BadRequest("hospital_id and mapping_id are required".to_string()));
    }

    info!("Selecting display for mapping {}", request.mapping_id);

    let view = service
        .select(&request.hospital_id, &request.mapping_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(view))
}

/// Current queue view
pub async fn get_display(State(service): State<Arc<DisplayService>>) -> Result<Json<QueueView>, AppError> {
    let view = service.current_view().await.map_err(to_app_error)?;
    Ok(Json(view))
}

pub async fn stop_display(State(service): State<Arc<DisplayService>>) -> Result<StatusCode, AppError> {
    if service.stop().await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(to_app_error(BookingQueueError::NoDisplay))
    }
}

pub async fn select_date(
    State(service): State<Arc<DisplayService>>,
    Json(request): Json<SelectDateRequest>,
) -> Result<Json<QueueView>, AppError> {
    let view = service
        .set_selected_date(request.date)
        .await
        .map_err(to_app_error)?;

    Ok(Json(view))
}

/// Complete the current patient and call the next one in
pub async fn call_next(State(service): State<Arc<DisplayService>>) -> Result<Json<CalledPatient>, AppError> {
    let called = service.call_next().await.map_err(to_app_error)?;
    Ok(Json(called))
}
