use chrono::{Datelike, Duration, NaiveDateTime, Weekday};
use tracing::{debug, warn};

use shared_config::{AppConfig, DayNumbering};

use crate::models::{AvailabilityWindow, Session};

/// Day-of-week number as the upstream schedule writes it.
pub fn day_of_week_index(weekday: Weekday, numbering: DayNumbering) -> u32 {
    let from_sunday = weekday.num_days_from_sunday();
    match numbering {
        DayNumbering::SundayZero => from_sunday,
        DayNumbering::SundayOne => from_sunday + 1,
    }
}

/// Picks the window that is live at `now`.
///
/// Windows for other days are ignored. Each candidate is anchored on the
/// date of `now` and widened by `grace_minutes` on both sides; the bounds
/// are inclusive. Should same-day windows overlap, the first one in input
/// order wins.
pub fn resolve_session(
    windows: &[AvailabilityWindow],
    now_day_of_week: u32,
    now: NaiveDateTime,
    grace_minutes: i64,
) -> Option<Session> {
    let grace = Duration::minutes(grace_minutes);
    let today = now.date();

    let mut candidates = windows
        .iter()
        .filter(|window| window.day_of_week == now_day_of_week)
        .map(|window| {
            let start_time = today.and_time(window.start_time) - grace;
            let end_time = today.and_time(window.end_time) + grace;
            (window, start_time, end_time)
        })
        .filter(|(_, start_time, end_time)| *start_time <= now && now <= *end_time);

    let (window, start_time, end_time) = candidates.next()?;

    let overlapping = candidates.count();
    if overlapping > 0 {
        warn!(
            "{} further availability windows overlap {} at {}, keeping the first",
            overlapping, window.availability_id, now
        );
    }

    Some(Session {
        label: format!(
            "{} - {}",
            window.start_time.format("%I:%M%p"),
            window.end_time.format("%I:%M%p")
        ),
        value: window.availability_id.clone(),
        start_time,
        end_time,
        queue_type: window.queue_type.clone(),
    })
}

/// Session resolution with the grace period and day numbering taken from
/// configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionResolver {
    grace_minutes: i64,
    numbering: DayNumbering,
}

impl SessionResolver {
    pub fn new(grace_minutes: i64, numbering: DayNumbering) -> Self {
        Self {
            grace_minutes,
            numbering,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.session_grace_minutes, config.day_numbering)
    }

    pub fn resolve(&self, windows: &[AvailabilityWindow], now: NaiveDateTime) -> Option<Session> {
        let day = day_of_week_index(now.weekday(), self.numbering);
        let session = resolve_session(windows, day, now, self.grace_minutes);

        match &session {
            Some(session) => debug!("Resolved session {} ({})", session.value, session.label),
            None => debug!("No availability window live at {} (day {})", now, day),
        }

        session
    }
}
