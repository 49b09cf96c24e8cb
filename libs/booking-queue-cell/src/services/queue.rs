use doctor_cell::Session;
use shared_config::WaitingFilter;

use crate::{Booking, BookingStatus, QueueClassification};

/// Drops everything the display does not show and orders the rest by token.
/// The sort is stable, so equal tokens keep server order.
pub fn visible_bookings(bookings: Vec<Booking>) -> Vec<Booking> {
    let mut visible: Vec<Booking> = bookings
        .into_iter()
        .filter(|booking| booking.status.is_visible())
        .collect();

    visible.sort_by_key(|booking| booking.token_number);
    visible
}

/// Splits visible bookings into on-going and waiting.
///
/// With [`WaitingFilter::SessionOnly`] a waiting booking is kept when it
/// carries no availability id or the id of `session`. Input is expected to
/// be the output of [`visible_bookings`]; the result is a pure function of it.
pub fn classify(
    visible: &[Booking],
    session: Option<&Session>,
    filter: WaitingFilter,
    next_in_queue_limit: usize,
) -> QueueClassification {
    let on_going: Vec<Booking> = visible
        .iter()
        .filter(|booking| booking.status == BookingStatus::InProgress)
        .cloned()
        .collect();

    let waiting: Vec<Booking> = visible
        .iter()
        .filter(|booking| booking.status == BookingStatus::Waiting)
        .filter(|booking| belongs_to_session(booking, session, filter))
        .cloned()
        .collect();

    let next_in_queue = waiting.iter().take(next_in_queue_limit).cloned().collect();

    QueueClassification {
        on_going,
        waiting,
        next_in_queue,
    }
}

fn belongs_to_session(booking: &Booking, session: Option<&Session>, filter: WaitingFilter) -> bool {
    match (filter, session, booking.availability_id.as_deref()) {
        (WaitingFilter::All, _, _) => true,
        (WaitingFilter::SessionOnly, Some(session), Some(id)) => id == session.value,
        _ => true,
    }
}
