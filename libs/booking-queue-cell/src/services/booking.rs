use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, instrument};

use auth_cell::AuthenticatedClient;
use shared_database::{ApiRequest, ApiResponse};

use crate::{Booking, BookingQueueError, BookingStatus, UpdateBookingStatusRequest};

pub const BOOKING_STATUS_PATH: &str = "/booking/status";

pub struct BookingService {
    client: Arc<AuthenticatedClient>,
}

impl BookingService {
    pub fn new(client: Arc<AuthenticatedClient>) -> Self {
        Self { client }
    }

    /// Bookings for one availability window on `date`, exactly as the server
    /// lists them. An empty or null result is an empty queue.
    #[instrument(skip(self))]
    pub async fn list_bookings(
        &self,
        availability_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, BookingQueueError> {
        let request = ApiRequest::get(format!("/booking/availability/{}", availability_id))
            .query("date", date.format("%Y-%m-%d").to_string());

        let response = self.client.request(&request).await?;
        ensure_success(&response)?;

        let bookings: Option<Vec<Booking>> = response
            .result()
            .map_err(|e| BookingQueueError::Malformed(e.to_string()))?;
        let bookings = bookings.unwrap_or_default();

        debug!("Fetched {} bookings for availability {}", bookings.len(), availability_id);
        Ok(bookings)
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, booking_id: i64, status: BookingStatus) -> Result<(), BookingQueueError> {
        let body = serde_json::to_value(UpdateBookingStatusRequest { booking_id, status })?;
        let request = ApiRequest::patch(BOOKING_STATUS_PATH).json(body);

        let response = self.client.request(&request).await?;
        ensure_success(&response)?;

        debug!("Booking {} moved to status {}", booking_id, status.code());
        Ok(())
    }
}

fn ensure_success(response: &ApiResponse) -> Result<(), BookingQueueError> {
    if response.is_success() {
        return Ok(());
    }

    Err(BookingQueueError::Api {
        status: response.status.as_u16(),
        message: response
            .error_message()
            .unwrap_or_else(|| format!("Request failed with status {}", response.status)),
    })
}
