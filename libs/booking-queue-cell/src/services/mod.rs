pub mod announcer;
pub mod booking;
pub mod display;
pub mod live_queue;
pub mod notifications;
pub mod poller;
pub mod queue;

pub use announcer::*;
pub use booking::*;
pub use display::*;
pub use live_queue::*;
pub use notifications::*;
pub use poller::*;
pub use queue::*;
