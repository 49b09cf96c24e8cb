pub mod availability;
pub mod session;

pub use availability::AvailabilityService;
pub use session::{day_of_week_index, resolve_session, SessionResolver};
