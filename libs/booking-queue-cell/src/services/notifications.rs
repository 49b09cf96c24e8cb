use tokio::sync::broadcast;
use tracing::debug;

use crate::{Booking, QueueEvent};

pub type QueueEventSender = broadcast::Sender<QueueEvent>;
pub type QueueEventReceiver = broadcast::Receiver<QueueEvent>;

/// Fan-out of display notifications (patient called, call failed, signed
/// out) to any number of subscribers.
pub struct QueueNotificationService {
    sender: QueueEventSender,
}

impl QueueNotificationService {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    pub fn subscribe(&self) -> QueueEventReceiver {
        self.sender.subscribe()
    }

    pub fn notify_patient_called(&self, mapping_id: &str, booking: &Booking) {
        self.publish(QueueEvent::PatientCalled {
            mapping_id: mapping_id.to_string(),
            booking_id: booking.booking_id,
            token_number: booking.token_number,
            full_name: booking.full_name.clone(),
        });
    }

    pub fn notify_call_failed(&self, mapping_id: &str, message: String) {
        self.publish(QueueEvent::CallNextFailed {
            mapping_id: mapping_id.to_string(),
            message,
        });
    }

    pub fn notify_signed_out(&self, mapping_id: &str) {
        self.publish(QueueEvent::SignedOut {
            mapping_id: mapping_id.to_string(),
        });
    }

    fn publish(&self, event: QueueEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!("Queue event delivered to {} subscribers", receivers),
            Err(_) => debug!("Queue event dropped, no subscribers"),
        }
    }
}

impl Default for QueueNotificationService {
    fn default() -> Self {
        Self::new()
    }
}
