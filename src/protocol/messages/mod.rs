//! Application-level message structures carried inside wire frames:
//! received PGN messages, heartbeat diagnostics, and version reports.
//!
//! All payload offsets are relative to the frame payload, which excludes the
//! message identifier byte.
use crate::infra::codec::Pdu;

/// Maximum data length of a single PGN message (long transport transfers).
pub const MAX_PGN_DATA: usize = 1785;

// RXDATA payload header: pgn(3) + destination + source + priority.
const PGN_HEADER_LEN: usize = 6;

//==================================================================================PgnMessage

#[derive(Debug, Clone, PartialEq, Eq)]
/// A CAN/J1939 message as reported by (or submitted to) the gateway.
pub struct PgnMessage {
    /// 24-bit Parameter Group Number.
    pub pgn: u32,
    /// Destination address (255 = broadcast).
    pub destination: u8,
    /// Source address of the transmitting node.
    pub source: u8,
    /// J1939 priority (0 highest).
    pub priority: u8,
    data: [u8; MAX_PGN_DATA],
    len: usize,
}

impl PgnMessage {
    /// Decode an RXDATA frame payload: `[pgn_hi, pgn_mid, pgn_lo, dst, src,
    /// prio, data...]`. Returns `None` when the header is incomplete.
    pub fn from_rx_payload(payload: &[u8]) -> Option<Self> {
        if payload.len() < PGN_HEADER_LEN {
            return None;
        }

        let pgn =
            ((payload[0] as u32) << 16) | ((payload[1] as u32) << 8) | payload[2] as u32;

        let raw = &payload[PGN_HEADER_LEN..];
        let len = raw.len().min(MAX_PGN_DATA);
        let mut data = [0; MAX_PGN_DATA];
        data[..len].copy_from_slice(&raw[..len]);

        Some(Self {
            pgn,
            destination: payload[3],
            source: payload[4],
            priority: payload[5],
            data,
            len,
        })
    }

    /// Decode the RXDATA frame itself.
    pub fn from_rx_pdu(pdu: &Pdu) -> Option<Self> {
        Self::from_rx_payload(pdu.payload())
    }

    /// Message data bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

//==================================================================================Versions

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Three-part version reported by the board, displayed as dotted hex.
pub struct Version(pub [u8; 3]);

impl core::fmt::Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:x}.{:x}.{:x}", self.0[0], self.0[1], self.0[2])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Board diagnostics accumulated from heartbeat and version reports.
pub struct BoardDiagnostics {
    /// Hardware version.
    pub hw_version: Version,
    /// Firmware version.
    pub sw_version: Version,
    /// Cumulative checksum-error count reported by the board.
    pub checksum_errors: u8,
    /// Cumulative stuff-error count reported by the board.
    pub stuff_errors: u8,
}

impl BoardDiagnostics {
    /// Zeroed diagnostics, before any report has arrived.
    pub const fn new() -> Self {
        Self {
            hw_version: Version([0; 3]),
            sw_version: Version([0; 3]),
            checksum_errors: 0,
            stuff_errors: 0,
        }
    }

    /// Store the version bytes shared by heartbeat and version payloads.
    pub fn store_versions(&mut self, payload: &[u8]) {
        if payload.len() < 6 {
            return;
        }
        self.hw_version = Version([payload[0], payload[1], payload[2]]);
        self.sw_version = Version([payload[3], payload[4], payload[5]]);
    }

    /// Apply a full heartbeat payload: versions plus error counters.
    pub fn store_heartbeat(&mut self, payload: &[u8]) {
        self.store_versions(payload);
        if payload.len() >= 8 {
            self.checksum_errors = payload[6];
            self.stuff_errors = payload[7];
        }
    }
}
