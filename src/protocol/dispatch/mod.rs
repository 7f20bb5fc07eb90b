//! Routing of decoded frames to their consumers: acknowledgements and status
//! reports settle pending requests in the tracker, heartbeats refresh the
//! board diagnostics, and received PGN messages become events.
//!
//! Dispatch is purely synchronous; the session's pump loop feeds it one frame
//! at a time, so the borrow of tracker and channels never outlives one call.
use crate::infra::codec::Pdu;
use crate::protocol::channel::CanChannel;
use crate::protocol::command::{MSG_ID_ACK, MSG_ID_HEARTBEAT, MSG_ID_VERSION};
use crate::protocol::event::Event;
use crate::protocol::messages::{BoardDiagnostics, PgnMessage};
use crate::protocol::tracker::{RequestTracker, KEY_ACK, KEY_NONE};

/// Frame router owning the diagnostics accumulated from board reports.
#[derive(Debug, Default)]
pub struct Dispatcher {
    diagnostics: BoardDiagnostics,
}

impl Dispatcher {
    /// Instantiate with zeroed diagnostics.
    pub const fn new() -> Self {
        Self {
            diagnostics: BoardDiagnostics::new(),
        }
    }

    /// Diagnostics gathered from heartbeat and version reports so far.
    pub fn diagnostics(&self) -> &BoardDiagnostics {
        &self.diagnostics
    }

    /// Route one decoded frame.
    ///
    /// Unrecognized identifiers are dropped silently; the board may be newer
    /// than this driver.
    pub fn dispatch(
        &mut self,
        pdu: &Pdu,
        tracker: &mut RequestTracker,
        can1: &mut CanChannel,
        can2: Option<&mut CanChannel>,
        mut emit: impl FnMut(Event),
    ) {
        let payload = pdu.payload();
        match pdu.id {
            MSG_ID_ACK => {
                // The payload names the command being acknowledged.
                if let Some(&target) = payload.first() {
                    tracker.resolve(target, KEY_ACK, Ok(()));
                }
            }
            MSG_ID_HEARTBEAT => {
                self.diagnostics.store_heartbeat(payload);
                emit(Event::Heartbeat(self.diagnostics));
            }
            MSG_ID_VERSION => {
                self.diagnostics.store_versions(payload);
                tracker.resolve(MSG_ID_VERSION, KEY_NONE, Ok(()));
            }
            id => {
                if Self::dispatch_channel(id, payload, tracker, can1, &mut emit) {
                    return;
                }
                if let Some(can2) = can2 {
                    Self::dispatch_channel(id, payload, tracker, can2, &mut emit);
                }
            }
        }
    }

    /// Handle a frame owned by `channel`. Returns whether the identifier
    /// belonged to it (even if the payload turned out malformed).
    fn dispatch_channel(
        id: u8,
        payload: &[u8],
        tracker: &mut RequestTracker,
        channel: &mut CanChannel,
        emit: &mut impl FnMut(Event),
    ) -> bool {
        let commands = *channel.commands();
        if !commands.owns(id) {
            return false;
        }

        if id == commands.rx_data {
            if let Some(message) = PgnMessage::from_rx_payload(payload) {
                emit(Event::Pgn {
                    channel: channel.index(),
                    message,
                });
            }
        } else if id == commands.rep_status {
            if let Some(claim) = channel.handle_status(payload) {
                emit(Event::Address(claim));
            }
            // Settles an explicit status request, when one is pending.
            tracker.resolve(commands.rep_status, KEY_NONE, Ok(()));
        }
        true
    }
}
