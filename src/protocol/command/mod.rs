//! Message identifiers of the gateway wire protocol.
//!
//! Board-level commands use fixed identifiers; channel-scoped commands live in
//! a numeric block that is mirrored at an offset of 128 for the second CAN
//! channel of dual-port boards. The per-channel table is computed from the
//! channel index instead of being duplicated as literals.

//==================================================================================Board identifiers

/// Acknowledgement of a previously sent command; payload echoes the target id.
pub const MSG_ID_ACK: u8 = 0;
/// Reset the board to defaults.
pub const MSG_ID_RESET: u8 = 5;
/// Unsolicited periodic heartbeat report.
pub const MSG_ID_HEARTBEAT: u8 = 6;
/// Enter the firmware-flash bootloader.
pub const MSG_ID_FLASH: u8 = 10;
/// Enable or disable command acknowledgements.
pub const MSG_ID_SETACK: u8 = 11;
/// Set the heartbeat interval.
pub const MSG_ID_SETHEART: u8 = 12;
/// Version report (also the REQINFO selector requesting it).
pub const MSG_ID_VERSION: u8 = 13;

//==================================================================================Channel identifiers

/// Identifier offset separating channel 2 commands from channel 1.
const CHANNEL2_OFFSET: u8 = 128;

// Channel 1 base values; channel 2 mirrors the layout at +128.
const ADDFILTER: u8 = 1;
const DELFILTER: u8 = 2;
const TXDATA: u8 = 3;
const RXDATA: u8 = 4;
const SETPARAM: u8 = 7;
const REQINFO: u8 = 8;
const REPSTATUS: u8 = 9;
const SETPARAM1: u8 = 14;
const SETMSGMODE: u8 = 15;
const TXDATAL: u8 = 16;
const TXDATAP: u8 = 17;
const TXDATAPL: u8 = 18;

/// REQINFO selector requesting a status report; the selector is the
/// channel 1 identifier regardless of which channel's REQINFO carries it.
pub const INFO_SELECTOR_STATUS: u8 = REPSTATUS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Index of a CAN channel on the board.
pub enum ChannelIndex {
    Can1,
    Can2,
}

impl ChannelIndex {
    /// Identifier offset applied to the channel-scoped command block.
    const fn offset(self) -> u8 {
        match self {
            ChannelIndex::Can1 => 0,
            ChannelIndex::Can2 => CHANNEL2_OFFSET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Channel-scoped command identifiers, resolved once at construction time.
pub struct CommandSet {
    pub add_filter: u8,
    pub del_filter: u8,
    pub tx_data: u8,
    pub rx_data: u8,
    pub set_param: u8,
    pub req_info: u8,
    pub rep_status: u8,
    pub set_param1: u8,
    pub set_msg_mode: u8,
    pub tx_data_loopback: u8,
    pub tx_data_periodic: u8,
    pub tx_data_periodic_loopback: u8,
}

impl CommandSet {
    /// Build the identifier table for one channel.
    pub const fn new(index: ChannelIndex) -> Self {
        let offset = index.offset();
        Self {
            add_filter: ADDFILTER + offset,
            del_filter: DELFILTER + offset,
            tx_data: TXDATA + offset,
            rx_data: RXDATA + offset,
            set_param: SETPARAM + offset,
            req_info: REQINFO + offset,
            rep_status: REPSTATUS + offset,
            set_param1: SETPARAM1 + offset,
            set_msg_mode: SETMSGMODE + offset,
            tx_data_loopback: TXDATAL + offset,
            tx_data_periodic: TXDATAP + offset,
            tx_data_periodic_loopback: TXDATAPL + offset,
        }
    }

    /// Whether `id` falls inside this channel's reserved identifier block.
    ///
    /// Board-level identifiers (reset, heartbeat, flash, ack control,
    /// version) sit in the gaps of the channel 1 block and are not owned by
    /// either channel.
    pub const fn owns(&self, id: u8) -> bool {
        let offset = self.add_filter - ADDFILTER;
        let relative = id.wrapping_sub(offset);
        matches!(
            relative,
            ADDFILTER
                | DELFILTER
                | TXDATA
                | RXDATA
                | SETPARAM
                | REQINFO
                | REPSTATUS
                | SETPARAM1
                | SETMSGMODE
                | TXDATAL
                | TXDATAP
                | TXDATAPL
        )
    }
}
