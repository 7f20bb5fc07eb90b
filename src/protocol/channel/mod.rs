//! Per-channel CAN state: address-claim negotiation tracking, the subscribed
//! filter table, and construction of the channel-scoped command payloads.
//!
//! The channel owns no I/O. It builds payloads and digests status reports;
//! the session performs the sends and drives the acknowledgement waits.
use crate::config::{ChannelConfig, DEFAULT_PRIORITY, UNCLAIMED_ADDRESS};
use crate::error::EncodeError;
use crate::protocol::command::{ChannelIndex, CommandSet};
use crate::protocol::event::{AddressClaim, ClaimStatus};
use crate::protocol::messages::MAX_PGN_DATA;

//==================================================================================Constants

/// Maximum number of PGN filters tracked per channel.
pub const MAX_FILTERS: usize = 32;

/// Fixed length of the SETPARAM1 payload: name(8) + address + range + mode.
pub const SET_ADDRESS_PAYLOAD_LEN: usize = 12;

// TXDATA* payload header: pgn(3) + destination + source + priority.
const TX_HEADER_LEN: usize = 6;

/// Largest TXDATA* payload: header + periodic interval + data.
pub const MAX_TX_PAYLOAD: usize = TX_HEADER_LEN + 2 + MAX_PGN_DATA;

//==================================================================================Claim state

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Negotiation state of the channel. Re-entrant: a fresh configuration may
/// restart the claim from any state.
pub enum ClaimState {
    #[default]
    Idle,
    ClaimInProgress,
    Claimed,
    ClaimFailed,
    ListenOnly,
}

impl ClaimState {
    fn from_status(status: ClaimStatus) -> Self {
        match status {
            ClaimStatus::InProgress => ClaimState::ClaimInProgress,
            ClaimStatus::Successful => ClaimState::Claimed,
            ClaimStatus::Failed => ClaimState::ClaimFailed,
            ClaimStatus::ListenOnly => ClaimState::ListenOnly,
            // Unknown codes leave the state untouched upstream.
            ClaimStatus::Unknown(_) => ClaimState::Idle,
        }
    }
}

//==================================================================================Send options

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Options for an outbound PGN message.
pub struct SendOptions {
    /// Also receive our own transmission.
    pub loopback: bool,
    /// Recurring transmission interval in milliseconds; 0 cancels a periodic
    /// transmission on the board.
    pub interval: Option<u16>,
    /// Override of the source address; defaults to the last negotiated one.
    pub source_address: Option<u8>,
    /// J1939 priority; defaults to 4.
    pub priority: Option<u8>,
}

//==================================================================================CanChannel

/// One CAN channel of the gateway board.
#[derive(Debug)]
pub struct CanChannel {
    index: ChannelIndex,
    commands: CommandSet,
    config: ChannelConfig,
    state: ClaimState,
    reported_source_address: u8,
    reported_claim_status: u8,
    filters: [u32; MAX_FILTERS],
    filter_count: usize,
}

impl CanChannel {
    /// Build a channel from its index and configuration.
    pub fn new(index: ChannelIndex, config: ChannelConfig) -> Self {
        Self {
            index,
            commands: CommandSet::new(index),
            config,
            state: ClaimState::Idle,
            reported_source_address: UNCLAIMED_ADDRESS,
            reported_claim_status: 0,
            filters: [0; MAX_FILTERS],
            filter_count: 0,
        }
    }

    /// Channel index on the board.
    pub fn index(&self) -> ChannelIndex {
        self.index
    }

    /// Command identifier table of this channel.
    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    /// Channel configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Current negotiation state.
    pub fn state(&self) -> ClaimState {
        self.state
    }

    /// Last source address reported by the board (254 before any claim).
    pub fn source_address(&self) -> u8 {
        self.reported_source_address
    }

    /// Last claim status code reported by the board, decoded.
    pub fn claim_status(&self) -> ClaimStatus {
        ClaimStatus::from_code(self.reported_claim_status)
    }

    /// PGNs currently subscribed, in subscription order. Duplicates are kept;
    /// deduplication is the caller's responsibility.
    pub fn filters(&self) -> &[u32] {
        &self.filters[..self.filter_count]
    }

    /// Mark the start of a (re)negotiation; called when configuration sends
    /// the address-claim parameters.
    pub fn begin_claim(&mut self) {
        self.state = ClaimState::ClaimInProgress;
    }

    //==================================================================================Payload builders

    /// SETPARAM1 payload: `[name(8), preferred, range_from, range_to, 1]`.
    pub fn set_address_payload(&self) -> [u8; SET_ADDRESS_PAYLOAD_LEN] {
        let mut payload = [0; SET_ADDRESS_PAYLOAD_LEN];
        payload[..8].copy_from_slice(&self.config.name);
        payload[8] = self.config.preferred_address;
        payload[9] = self.config.address_range.from;
        payload[10] = self.config.address_range.to;
        payload[11] = 1; // communication mode
        payload
    }

    /// SETPARAM1 payload putting the channel in listen-only mode.
    pub fn listen_only_payload(&self) -> [u8; SET_ADDRESS_PAYLOAD_LEN] {
        let mut payload = [0; SET_ADDRESS_PAYLOAD_LEN];
        payload[8] = UNCLAIMED_ADDRESS;
        payload[9] = UNCLAIMED_ADDRESS;
        payload[10] = UNCLAIMED_ADDRESS;
        payload[11] = 0; // listen mode
        payload
    }

    /// SETMSGMODE payload.
    pub fn mode_payload(&self) -> [u8; 1] {
        [self.config.message_mode as u8]
    }

    /// ADDFILTER / DELFILTER payload: big-endian 24-bit PGN.
    pub fn filter_payload(pgn: u32) -> [u8; 3] {
        [(pgn >> 16) as u8, (pgn >> 8) as u8, pgn as u8]
    }

    /// Select the TXDATA* identifier and build its payload.
    ///
    /// The identifier depends on `(loopback, interval present)`; a periodic
    /// message carries the big-endian interval between the header and the
    /// data. Fails fast when `data` exceeds [`MAX_PGN_DATA`].
    pub fn tx_message(
        &self,
        pgn: u32,
        destination: u8,
        data: &[u8],
        options: &SendOptions,
    ) -> Result<(u8, [u8; MAX_TX_PAYLOAD], usize), EncodeError> {
        if data.len() > MAX_PGN_DATA {
            return Err(EncodeError::PayloadTooLong {
                len: data.len(),
                max: MAX_PGN_DATA,
            });
        }

        let msg_id = match (options.loopback, options.interval.is_some()) {
            (false, false) => self.commands.tx_data,
            (false, true) => self.commands.tx_data_periodic,
            (true, false) => self.commands.tx_data_loopback,
            (true, true) => self.commands.tx_data_periodic_loopback,
        };

        let source = options
            .source_address
            .unwrap_or(self.reported_source_address);
        let priority = options.priority.unwrap_or(DEFAULT_PRIORITY);

        let mut payload = [0; MAX_TX_PAYLOAD];
        payload[0] = (pgn >> 16) as u8;
        payload[1] = (pgn >> 8) as u8;
        payload[2] = pgn as u8;
        payload[3] = destination;
        payload[4] = source;
        payload[5] = priority;
        let mut len = TX_HEADER_LEN;

        if let Some(interval) = options.interval {
            payload[len] = (interval >> 8) as u8;
            payload[len + 1] = interval as u8;
            len += 2;
        }

        payload[len..len + data.len()].copy_from_slice(data);
        len += data.len();

        Ok((msg_id, payload, len))
    }

    //==================================================================================Status handling

    /// Digest a status-report payload: `payload[0]` carries the claim status
    /// code and `payload[1]` the reported source address.
    ///
    /// Stored values are updated unconditionally; a notification is returned
    /// only when the `(status, address)` pair changed, so repeated identical
    /// reports stay silent.
    pub fn handle_status(&mut self, payload: &[u8]) -> Option<AddressClaim> {
        if payload.len() < 2 {
            return None;
        }
        let status_code = payload[0];
        let address = payload[1];

        let changed = self.reported_claim_status != status_code
            || self.reported_source_address != address;

        self.reported_claim_status = status_code;
        self.reported_source_address = address;

        let status = ClaimStatus::from_code(status_code);
        if !matches!(status, ClaimStatus::Unknown(_)) {
            self.state = ClaimState::from_status(status);
        }

        changed.then_some(AddressClaim {
            channel: self.index,
            status,
            address,
        })
    }

    //==================================================================================Filter bookkeeping

    /// Record a successfully subscribed PGN.
    pub(crate) fn note_filter_added(&mut self, pgn: u32) {
        if self.filter_count < MAX_FILTERS {
            self.filters[self.filter_count] = pgn;
            self.filter_count += 1;
        }
    }

    /// Drop the first subscription entry matching `pgn`.
    pub(crate) fn note_filter_removed(&mut self, pgn: u32) {
        if let Some(pos) = self.filters[..self.filter_count]
            .iter()
            .position(|&p| p == pgn)
        {
            self.filters.copy_within(pos + 1..self.filter_count, pos);
            self.filter_count -= 1;
        }
    }

    /// Replace the configuration and reset negotiation state; used when the
    /// caller reconfigures a live session.
    pub fn reconfigure(&mut self, config: ChannelConfig) {
        self.config = config;
        self.state = ClaimState::Idle;
        self.reported_source_address = UNCLAIMED_ADDRESS;
        self.reported_claim_status = 0;
    }
}
