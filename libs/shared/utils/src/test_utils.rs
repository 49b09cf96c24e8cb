use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

use shared_config::AppConfig;

pub struct TestConfig {
    pub clinic_api_url: String,
    pub poll_interval_ms: u64,
    pub session_grace_minutes: i64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            clinic_api_url: "http://localhost:54321".to_string(),
            poll_interval_ms: 5000,
            session_grace_minutes: 30,
        }
    }
}

impl TestConfig {
    pub fn with_api_url(url: impl Into<String>) -> Self {
        Self {
            clinic_api_url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            clinic_api_url: self.clinic_api_url.clone(),
            poll_interval_ms: self.poll_interval_ms,
            session_grace_minutes: self.session_grace_minutes,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Local wall-clock instant, panicking on impossible dates (test use only).
pub fn local_datetime(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .unwrap_or_else(|| panic!("invalid test datetime {}-{}-{} {}:{}", year, month, day, hour, minute))
}

pub struct MockClinicResponses;

impl MockClinicResponses {
    pub fn availability_window(
        availability_id: &str,
        day_of_week: u32,
        start_time: &str,
        end_time: &str,
    ) -> Value {
        json!({
            "availability_id": availability_id,
            "doctor_id": "doctor-1",
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "queue_type": "token"
        })
    }

    pub fn doctor_availability_response(windows: Vec<Value>) -> Value {
        json!({
            "result": {
                "doctor_details": {
                    "doctor_id": "doctor-1",
                    "full_name": "Asha Menon"
                },
                "doctor_availability": windows
            }
        })
    }

    pub fn booking(booking_id: i64, token_number: i64, status: i32, full_name: &str, availability_id: &str) -> Value {
        json!({
            "booking_id": booking_id,
            "token_number": token_number,
            "full_name": full_name,
            "status": status,
            "availability_id": availability_id,
            "date": "2024-03-05"
        })
    }

    pub fn booking_list_response(bookings: Vec<Value>) -> Value {
        json!({ "result": bookings })
    }

    pub fn refresh_response(access_token: &str, refresh_token: &str) -> Value {
        json!({
            "result": {
                "access_token": access_token,
                "refresh_token": refresh_token
            }
        })
    }

    pub fn ok_response() -> Value {
        json!({ "result": "ok" })
    }

    pub fn error_response(message: &str) -> Value {
        json!({ "error": message })
    }
}
