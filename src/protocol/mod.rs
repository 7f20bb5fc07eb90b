//! Gateway protocol implementation: command identifier tables, message
//! structures, request/response correlation, frame dispatch, per-channel
//! address negotiation, and the board session tying them together.
pub mod channel;
pub mod command;
pub mod dispatch;
pub mod event;
pub mod messages;
pub mod session;
pub mod tracker;
pub mod traits;
