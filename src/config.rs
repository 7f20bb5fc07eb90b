//! Driver configuration: serial parameters, board-wide options, and the
//! per-channel address/mode setup consumed by the session at configure time.
//!
//! Every config type implements `Default`; a session always receives its own
//! copy, so mutating one session's options can never leak into another.
use crate::error::ConfigError;

/// Default serial baud rate of the gateway board.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default acknowledgement timeout applied to tracked requests (ms).
pub const DEFAULT_TIMEOUT_MS: u32 = 2_000;

/// Default J1939 priority for outbound PGN messages.
pub const DEFAULT_PRIORITY: u8 = 4;

/// Source address reported before any claim completes (J1939 null address).
pub const UNCLAIMED_ADDRESS: u8 = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// CAN bus bitrate selected on reset.
pub enum CanBitrate {
    /// 250 kbit/s, the J1939 default.
    #[default]
    K250,
    /// 500 kbit/s.
    K500,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Message mode of a CAN channel.
pub enum MessageMode {
    /// Normal ECU mode.
    #[default]
    Normal = 0,
    /// Gateway mode 1: report all PGNs including the global address.
    GatewayAll = 1,
    /// Gateway mode 2: mode 1 plus protocol PGNs.
    GatewayAllProtocol = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Fallback address range tried when the preferred address is taken.
pub struct AddressRange {
    pub from: u8,
    pub to: u8,
}

impl Default for AddressRange {
    fn default() -> Self {
        // Benign range: never negotiate an alternative address.
        Self {
            from: UNCLAIMED_ADDRESS,
            to: UNCLAIMED_ADDRESS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Configuration of one CAN channel on the board.
pub struct ChannelConfig {
    /// Address to negotiate. 254 leaves the channel in listen-only mode.
    pub preferred_address: u8,
    /// 8-byte J1939 NAME sent with the claim request.
    pub name: [u8; 8],
    /// Range tried when the preferred address is not available.
    pub address_range: AddressRange,
    /// Reporting mode for received traffic.
    pub message_mode: MessageMode,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            preferred_address: UNCLAIMED_ADDRESS,
            name: [0; 8],
            address_range: AddressRange::default(),
            message_mode: MessageMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Board-wide configuration handed to [`BoardSession`](crate::protocol::session::BoardSession).
pub struct GatewayConfig {
    /// Serial port baud rate.
    pub baud_rate: u32,
    /// Whether the board acknowledges commands. When disabled, tracked sends
    /// resolve immediately after the write.
    pub ack: bool,
    /// Heartbeat interval in milliseconds. 0 disables the heartbeat,
    /// otherwise 100..=5000.
    pub heartbeat_ms: u16,
    /// CAN bitrate programmed on reset.
    pub can_bitrate: CanBitrate,
    /// First CAN channel.
    pub can1: ChannelConfig,
    /// Second CAN channel on dual-port boards.
    pub can2: Option<ChannelConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            ack: true,
            heartbeat_ms: 0,
            can_bitrate: CanBitrate::default(),
            can1: ChannelConfig::default(),
            can2: None,
        }
    }
}

impl GatewayConfig {
    /// Validate the configuration before a session is built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_heartbeat(self.heartbeat_ms)?;
        self.can1.validate()?;
        if let Some(can2) = &self.can2 {
            can2.validate()?;
        }
        Ok(())
    }
}

impl ChannelConfig {
    /// Validate the channel parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = self.address_range;
        if range.from > range.to {
            return Err(ConfigError::InvalidAddressRange {
                from: range.from,
                to: range.to,
            });
        }
        Ok(())
    }
}

/// Check a heartbeat interval: 0 disables, otherwise 100..=5000 ms.
pub fn validate_heartbeat(ms: u16) -> Result<(), ConfigError> {
    if ms == 0 || (100..=5000).contains(&ms) {
        Ok(())
    } else {
        Err(ConfigError::InvalidHeartbeat { ms })
    }
}
