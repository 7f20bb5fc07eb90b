//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (wire framing, frame encoding,
//! request completion, configuration validation, transport).
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors detected while decoding the stuffed wire format.
///
/// Framing errors are never fatal: the decoder reports the bad segment and
/// resynchronizes on the next START byte.
pub enum FramingError {
    /// The recomputed checksum does not match the received byte.
    #[error("Checksum mismatch: expected {expected:#04X}, got {actual:#04X}")]
    ChecksumMismatch { expected: u8, actual: u8 },
    /// The declared length exceeds what the decoder can buffer.
    #[error("Declared frame length {declared} exceeds the decoder buffer")]
    FrameTooLong { declared: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while building an outbound wire frame.
pub enum EncodeError {
    /// Payload exceeds the hard per-frame maximum.
    #[error("Payload length {len} exceeds the {max}-byte frame maximum")]
    PayloadTooLong { len: usize, max: usize },
    /// Provided output buffer cannot hold the worst-case stuffed frame.
    #[error("Buffer too small")]
    BufferTooSmall,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Terminal outcome of a pending request that did not complete normally.
pub enum ResponseError {
    /// No matching response arrived before the request deadline.
    #[error("No response to message {msg_id}")]
    Timeout { msg_id: u8 },
    /// The session was closed while the request was in flight.
    #[error("Port closed")]
    Closed,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Configuration rejected at construction time.
pub enum ConfigError {
    /// Heartbeat interval must be 0 (disabled) or within 100..=5000 ms.
    #[error("Invalid heartbeat interval: {ms} ms")]
    InvalidHeartbeat { ms: u16 },
    /// Address range lower bound is above the upper bound.
    #[error("Invalid address range {from}..{to}")]
    InvalidAddressRange { from: u8, to: u8 },
}

#[derive(Error, Debug)]
/// Top-level failure of a session operation.
///
/// Generic over the transport error so the driver can plug into any serial
/// byte-stream implementation.
pub enum GatewayError<E: core::fmt::Debug> {
    /// The underlying serial link reported an error.
    #[error("Serial link error: {0:?}")]
    Link(E),

    /// The serial link reached end of stream.
    #[error("Serial link closed")]
    LinkClosed,

    /// Outbound frame construction failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The request completed with a failure (timeout or close).
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// A runtime option failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The pending-request queue is full.
    #[error("Too many requests in flight")]
    TooManyRequests,

    /// The addressed CAN channel is not configured on this board.
    #[error("Channel is not configured")]
    UnknownChannel,
}
