use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::debug;

use auth_cell::AuthenticatedClient;
use shared_database::ApiRequest;

use crate::models::DoctorAvailabilityResponse;

pub struct AvailabilityService {
    client: Arc<AuthenticatedClient>,
}

impl AvailabilityService {
    pub fn new(client: Arc<AuthenticatedClient>) -> Self {
        Self { client }
    }

    /// Doctor details and weekly availability windows for a doctor mapping.
    ///
    /// A failed refresh surfaces as [`auth_cell::AuthError::LoggedOut`]
    /// inside the returned error.
    pub async fn get_doctor_availability(&self, mapping_id: &str) -> Result<DoctorAvailabilityResponse> {
        debug!("Fetching availability for mapping: {}", mapping_id);

        let request = ApiRequest::get(format!("/doctor/availability/{}", mapping_id));
        let response = self.client.request(&request).await?;

        if !response.is_success() {
            return Err(anyhow!(
                "Availability request for mapping {} failed ({}): {}",
                mapping_id,
                response.status,
                response.error_message().unwrap_or_default()
            ));
        }

        let availability: DoctorAvailabilityResponse = response.result()?;
        debug!(
            "Mapping {} has {} availability windows",
            mapping_id,
            availability.doctor_availability.len()
        );

        Ok(availability)
    }
}
