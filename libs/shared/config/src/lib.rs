use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the upstream schedule numbers the days of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DayNumbering {
    /// 0 = Sunday ... 6 = Saturday
    SundayZero,
    /// 1 = Sunday ... 7 = Saturday
    SundayOne,
}

impl FromStr for DayNumbering {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sunday-zero" | "0" => Ok(Self::SundayZero),
            "sunday-one" | "1" => Ok(Self::SundayOne),
            other => Err(format!("unknown day numbering '{}'", other)),
        }
    }
}

/// Which waiting bookings are eligible for the "next in queue" list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitingFilter {
    /// Only bookings whose availability id matches the resolved session.
    SessionOnly,
    /// Every waiting booking returned for the session.
    All,
}

impl FromStr for WaitingFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "session" | "session-only" => Ok(Self::SessionOnly),
            "all" => Ok(Self::All),
            other => Err(format!("unknown waiting filter '{}'", other)),
        }
    }
}

/// What happens to the displayed queue when a fetch does not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleQueuePolicy {
    /// Drop the displayed bookings on any failed fetch.
    Clear,
    /// Keep showing the last successful snapshot.
    Keep,
}

impl FromStr for StaleQueuePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "keep" => Ok(Self::Keep),
            other => Err(format!("unknown stale queue policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub clinic_api_url: String,
    pub hospital_id: Option<String>,
    pub mapping_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
    pub credential_store_path: String,
    pub credential_ttl_days: i64,
    pub poll_interval_ms: u64,
    /// Upper bound on a single clinic API request.
    pub request_timeout_ms: u64,
    /// How long call-next waits for an in-flight poll before giving up.
    pub call_next_wait_ms: u64,
    pub session_grace_minutes: i64,
    pub next_in_queue_limit: usize,
    pub day_numbering: DayNumbering,
    pub waiting_filter: WaitingFilter,
    pub stale_queue_policy: StaleQueuePolicy,
    pub announcer_command: Option<String>,
    pub announcer_voices: Vec<String>,
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            clinic_api_url: String::new(),
            hospital_id: None,
            mapping_id: None,
            access_token: None,
            refresh_token: None,
            user_id: None,
            credential_store_path: ".clinic-queue/credentials.json".to_string(),
            credential_ttl_days: 30,
            poll_interval_ms: 5000,
            request_timeout_ms: 10_000,
            call_next_wait_ms: 5000,
            session_grace_minutes: 30,
            next_in_queue_limit: 3,
            day_numbering: DayNumbering::SundayZero,
            waiting_filter: WaitingFilter::SessionOnly,
            stale_queue_policy: StaleQueuePolicy::Clear,
            announcer_command: None,
            announcer_voices: Vec::new(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            clinic_api_url: env::var("CLINIC_API_URL")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_API_URL not set, using empty value");
                    String::new()
                }),
            hospital_id: optional_var("CLINIC_HOSPITAL_ID"),
            mapping_id: optional_var("CLINIC_MAPPING_ID"),
            access_token: optional_var("CLINIC_ACCESS_TOKEN"),
            refresh_token: optional_var("CLINIC_REFRESH_TOKEN"),
            user_id: optional_var("CLINIC_USER_ID"),
            credential_store_path: env::var("CREDENTIAL_STORE_PATH")
                .unwrap_or(defaults.credential_store_path),
            credential_ttl_days: bounded(
                "CREDENTIAL_TTL_DAYS",
                parsed_var("CREDENTIAL_TTL_DAYS", defaults.credential_ttl_days),
                CREDENTIAL_TTL_DAYS_RANGE,
            ),
            poll_interval_ms: parsed_var("QUEUE_POLL_INTERVAL_MS", defaults.poll_interval_ms),
            request_timeout_ms: parsed_var("CLINIC_API_TIMEOUT_MS", defaults.request_timeout_ms),
            call_next_wait_ms: parsed_var("CALL_NEXT_WAIT_MS", defaults.call_next_wait_ms),
            session_grace_minutes: bounded(
                "SESSION_GRACE_MINUTES",
                parsed_var("SESSION_GRACE_MINUTES", defaults.session_grace_minutes),
                SESSION_GRACE_MINUTES_RANGE,
            ),
            next_in_queue_limit: parsed_var("NEXT_IN_QUEUE_LIMIT", defaults.next_in_queue_limit),
            day_numbering: parsed_var("DAY_OF_WEEK_NUMBERING", defaults.day_numbering),
            waiting_filter: parsed_var("NEXT_IN_QUEUE_FILTER", defaults.waiting_filter),
            stale_queue_policy: parsed_var("STALE_QUEUE_POLICY", defaults.stale_queue_policy),
            announcer_command: optional_var("ANNOUNCER_COMMAND"),
            announcer_voices: optional_var("ANNOUNCER_VOICES")
                .map(|voices| {
                    voices
                        .split(',')
                        .map(|voice| voice.trim().to_string())
                        .filter(|voice| !voice.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            bind_addr: env::var("DISPLAY_BIND_ADDR").unwrap_or(defaults.bind_addr),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.clinic_api_url.is_empty()
    }

    pub fn has_seed_credentials(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some()
    }
}

/// Days and minutes feed chrono durations added to the current time.
const CREDENTIAL_TTL_DAYS_RANGE: (i64, i64) = (1, 3650);
const SESSION_GRACE_MINUTES_RANGE: (i64, i64) = (0, 720);

fn bounded(name: &str, value: i64, (min, max): (i64, i64)) -> i64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!("{} value {} out of range {}..={}, using {}", name, value, min, max, clamped);
    }
    clamped
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("{} has invalid value '{}' ({}), using default {:?}", name, raw, e, default);
            default
        }),
        Err(_) => default,
    }
}
