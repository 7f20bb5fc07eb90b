//! Abstraction traits used by the session (serial link and timer).
pub mod link_timer;
pub mod serial_link;

pub use link_timer::LinkTimer;
pub use serial_link::SerialLink;
