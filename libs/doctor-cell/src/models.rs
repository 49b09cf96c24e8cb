use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use shared_models::de::{optional_string_or_number, string_or_number};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    #[serde(default, alias = "id", deserialize_with = "optional_string_or_number")]
    pub doctor_id: Option<String>,
    pub full_name: String,
}

/// A recurring weekly window in which the doctor sees patients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    #[serde(deserialize_with = "string_or_number")]
    pub availability_id: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub doctor_id: Option<String>,
    pub day_of_week: u32,
    #[serde(with = "time_of_day")]
    pub start_time: NaiveTime,
    #[serde(with = "time_of_day")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub queue_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailabilityResponse {
    pub doctor_details: Doctor,
    #[serde(default)]
    pub doctor_availability: Vec<AvailabilityWindow>,
}

/// The availability window judged live right now, widened by the grace
/// period on both sides. Recomputed, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Nominal bounds, e.g. `09:00AM - 12:00PM`.
    pub label: String,
    /// Availability id the bookings are keyed by.
    pub value: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub queue_type: String,
}

impl Session {
    /// Inclusive at both ends.
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

/// `HH:MM:SS` on the wire; `HH:MM` and fractional seconds are accepted too.
pub mod time_of_day {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMATS: [&str; 3] = ["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        FORMATS
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(raw, format).ok())
    }

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid time of day '{}'", raw)))
    }
}
