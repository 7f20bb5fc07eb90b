//! Typed notifications exposed by the driver.
//!
//! The session never allocates: firmware or host code provides a pre-allocated
//! [`embassy_sync::channel::Channel`] and hands its sender to the session,
//! which publishes events with a non-blocking `try_send` so notification
//! delivery can never stall request resolution. A full channel drops the
//! event.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;

use crate::protocol::command::ChannelIndex;
use crate::protocol::messages::{BoardDiagnostics, PgnMessage};

/// Sender half of a caller-allocated event channel.
pub type EventSender<'a, const CAP: usize> =
    Sender<'a, CriticalSectionRawMutex, Event, CAP>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Decoded address-claim status of a CAN channel.
pub enum ClaimStatus {
    InProgress,
    Successful,
    Failed,
    ListenOnly,
    /// Status code not known to this driver; carried for forward
    /// compatibility.
    Unknown(u8),
}

impl ClaimStatus {
    /// Decode the status byte of a status report.
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => ClaimStatus::InProgress,
            2 => ClaimStatus::Successful,
            3 => ClaimStatus::Failed,
            4 => ClaimStatus::ListenOnly,
            other => ClaimStatus::Unknown(other),
        }
    }

    /// Raw protocol code.
    pub const fn code(&self) -> u8 {
        match self {
            ClaimStatus::InProgress => 1,
            ClaimStatus::Successful => 2,
            ClaimStatus::Failed => 3,
            ClaimStatus::ListenOnly => 4,
            ClaimStatus::Unknown(code) => *code,
        }
    }

    /// Human-readable reason string.
    pub const fn label(&self) -> &'static str {
        match self {
            ClaimStatus::InProgress => "Claim In Progress",
            ClaimStatus::Successful => "Claim Successful",
            ClaimStatus::Failed => "Claim Failed",
            ClaimStatus::ListenOnly => "Listen-Only Mode",
            ClaimStatus::Unknown(_) => "Unknown Status",
        }
    }
}

impl core::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ClaimStatus::Unknown(code) => write!(f, "Unknown Status {code}"),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Address-claim change on one channel, emitted only when the reported
/// `(status, address)` pair actually changed.
pub struct AddressClaim {
    pub channel: ChannelIndex,
    pub status: ClaimStatus,
    pub address: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Notification published by the session.
pub enum Event {
    /// Unsolicited periodic heartbeat; carries the refreshed diagnostics.
    Heartbeat(BoardDiagnostics),
    /// Claim-status change on a channel.
    Address(AddressClaim),
    /// Decoded PGN message received on a channel.
    Pgn {
        channel: ChannelIndex,
        message: PgnMessage,
    },
}
