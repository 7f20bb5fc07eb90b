//! Board session: drives one gateway board over a serial link.
//!
//! The session owns the decoder, the request tracker, the dispatcher, and the
//! channel state, and pumps them from a single loop: every await point either
//! reads from the link or sleeps until the next request deadline, so request
//! timeouts fire without any dedicated timer task.
//!
//! Event delivery goes through a caller-allocated
//! [`embassy_sync::channel::Channel`]; see [`crate::protocol::event`].
use futures_util::future::{select, Either};
use futures_util::pin_mut;

use crate::config::{
    validate_heartbeat, CanBitrate, GatewayConfig, MessageMode, DEFAULT_TIMEOUT_MS,
    UNCLAIMED_ADDRESS,
};
use crate::error::{ConfigError, GatewayError, ResponseError};
use crate::infra::codec::{encode_frame, DecodeEvent, FrameDecoder, MAX_ENCODED_FRAME};
use crate::protocol::channel::{CanChannel, SendOptions};
use crate::protocol::command::{
    ChannelIndex, INFO_SELECTOR_STATUS, MSG_ID_RESET, MSG_ID_SETACK, MSG_ID_SETHEART,
    MSG_ID_VERSION,
};
use crate::protocol::dispatch::Dispatcher;
use crate::protocol::event::{AddressClaim, EventSender};
use crate::protocol::messages::{BoardDiagnostics, Version};
use crate::protocol::tracker::{RequestTracker, SlotId, KEY_ACK, KEY_NONE, MAX_PENDING_REQUESTS};
use crate::protocol::traits::{LinkTimer, SerialLink};

//==================================================================================Constants

/// Size of the scratch buffer handed to [`SerialLink::read`].
const READ_CHUNK: usize = 256;

//==================================================================================Options

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Per-request options of a tracked send.
pub struct RequestOptions {
    /// Skip the acknowledgement wait for this send even when board
    /// acknowledgements are enabled.
    pub no_ack: bool,
    /// Deadline for the acknowledgement, in milliseconds.
    pub timeout_ms: u32,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            no_ack: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

//==================================================================================BoardSession

/// Session over one gateway board.
///
/// Generic over the serial transport and the timer so the same driver runs on
/// a desktop host or an embedded supervisor.
pub struct BoardSession<'a, L: SerialLink, T: LinkTimer, const EVT_CAP: usize> {
    link: L,
    timer: T,
    config: GatewayConfig,
    decoder: FrameDecoder,
    tracker: RequestTracker,
    dispatcher: Dispatcher,
    can1: CanChannel,
    can2: Option<CanChannel>,
    events: Option<EventSender<'a, EVT_CAP>>,
    framing_errors: u32,
}

impl<'a, L: SerialLink, T: LinkTimer, const EVT_CAP: usize> BoardSession<'a, L, T, EVT_CAP> {
    /// Build a session from a validated configuration. The link is expected
    /// to be open already; `configure` performs the board handshake.
    pub fn new(link: L, timer: T, config: GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            link,
            timer,
            decoder: FrameDecoder::new(),
            tracker: RequestTracker::new(),
            dispatcher: Dispatcher::new(),
            can1: CanChannel::new(ChannelIndex::Can1, config.can1),
            can2: config
                .can2
                .map(|c| CanChannel::new(ChannelIndex::Can2, c)),
            config,
            events: None,
            framing_errors: 0,
        })
    }

    /// Publish notifications through `sender`. Delivery is non-blocking; a
    /// full channel drops the event.
    pub fn attach_events(&mut self, sender: EventSender<'a, EVT_CAP>) {
        self.events = Some(sender);
    }

    //==================================================================================Accessors

    /// Active configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// First CAN channel.
    pub fn can1(&self) -> &CanChannel {
        &self.can1
    }

    /// Second CAN channel, when configured.
    pub fn can2(&self) -> Option<&CanChannel> {
        self.can2.as_ref()
    }

    /// Diagnostics gathered from heartbeat and version reports.
    pub fn diagnostics(&self) -> &BoardDiagnostics {
        self.dispatcher.diagnostics()
    }

    /// Hardware and firmware versions last reported by the board.
    pub fn versions(&self) -> (Version, Version) {
        let diagnostics = self.dispatcher.diagnostics();
        (diagnostics.hw_version, diagnostics.sw_version)
    }

    /// Count of framing errors observed on the inbound stream.
    pub fn framing_errors(&self) -> u32 {
        self.framing_errors
    }

    fn channel_ref(&self, index: ChannelIndex) -> Result<&CanChannel, GatewayError<L::Error>> {
        match index {
            ChannelIndex::Can1 => Ok(&self.can1),
            ChannelIndex::Can2 => self.can2.as_ref().ok_or(GatewayError::UnknownChannel),
        }
    }

    fn channel_mut(
        &mut self,
        index: ChannelIndex,
    ) -> Result<&mut CanChannel, GatewayError<L::Error>> {
        match index {
            ChannelIndex::Can1 => Ok(&mut self.can1),
            ChannelIndex::Can2 => self.can2.as_mut().ok_or(GatewayError::UnknownChannel),
        }
    }

    //==================================================================================Handshake

    /// Run the full board handshake, strictly sequential: reset, optional
    /// acknowledgement disable, heartbeat interval, then per-channel address
    /// claim and message mode. The first failing step aborts the remainder.
    pub async fn configure(&mut self) -> Result<(), GatewayError<L::Error>> {
        #[cfg(feature = "defmt")]
        defmt::info!("Configuring gateway board");

        self.reset().await?;

        if !self.config.ack {
            // The board re-enables acknowledgements on reset, so this very
            // command is still acknowledged; the reply goes unconsumed.
            self.write_frame(MSG_ID_SETACK, &[0]).await?;
        }

        let heartbeat_ms = self.config.heartbeat_ms;
        self.set_heartbeat(heartbeat_ms).await?;

        self.configure_channel(ChannelIndex::Can1).await?;
        if self.can2.is_some() {
            self.configure_channel(ChannelIndex::Can2).await?;
        }

        #[cfg(feature = "defmt")]
        defmt::info!("Gateway board configured");
        Ok(())
    }

    async fn configure_channel(
        &mut self,
        index: ChannelIndex,
    ) -> Result<(), GatewayError<L::Error>> {
        let channel = self.channel_ref(index)?;
        let commands = *channel.commands();
        let config = *channel.config();
        let claim_payload = channel.set_address_payload();
        let mode_payload = channel.mode_payload();

        if config.preferred_address != UNCLAIMED_ADDRESS {
            #[cfg(feature = "defmt")]
            defmt::info!("Claiming address {}", config.preferred_address);

            self.channel_mut(index)?.begin_claim();
            // The claim outcome arrives as an unsolicited status report and
            // may share a chunk with the acknowledgement, so its wait must
            // exist before the parameters go out.
            let deadline = self.timer.now_ms() + DEFAULT_TIMEOUT_MS as u64;
            let status_slot = self
                .tracker
                .register(commands.rep_status, KEY_NONE, deadline)
                .ok_or(GatewayError::TooManyRequests)?;
            if let Err(err) = self
                .send_message(commands.set_param1, &claim_payload, RequestOptions::default())
                .await
            {
                self.tracker.remove(status_slot);
                return Err(err);
            }
            self.drive(status_slot).await?;
        }

        if config.message_mode != MessageMode::Normal {
            self.send_message(commands.set_msg_mode, &mode_payload, RequestOptions::default())
                .await?;
        }
        Ok(())
    }

    //==================================================================================Board commands

    /// Reset the board to defaults, selecting the configured CAN bitrate.
    ///
    /// Pending requests are left in flight; only `close` flushes them.
    pub async fn reset(&mut self) -> Result<(), GatewayError<L::Error>> {
        let key = match self.config.can_bitrate {
            CanBitrate::K250 => 0x5A,
            CanBitrate::K500 => 0x5B,
        };
        self.send_message(MSG_ID_RESET, &[0xA5, 0x69, key], RequestOptions::default())
            .await
    }

    /// Enable or disable board acknowledgements. The wait policy of this very
    /// command follows the state the board is still in.
    pub async fn set_ack(&mut self, enabled: bool) -> Result<(), GatewayError<L::Error>> {
        self.send_message(MSG_ID_SETACK, &[enabled as u8], RequestOptions::default())
            .await?;
        self.config.ack = enabled;
        Ok(())
    }

    /// Set the heartbeat interval: 0 disables, otherwise 100..=5000 ms,
    /// transmitted big-endian.
    pub async fn set_heartbeat(&mut self, ms: u16) -> Result<(), GatewayError<L::Error>> {
        validate_heartbeat(ms)?;
        self.send_message(MSG_ID_SETHEART, &ms.to_be_bytes(), RequestOptions::default())
            .await?;
        self.config.heartbeat_ms = ms;
        Ok(())
    }

    /// Ask the board for its versions and wait for the report.
    pub async fn request_version(&mut self) -> Result<(Version, Version), GatewayError<L::Error>> {
        let req_info = self.can1.commands().req_info;
        // The version report itself is the reply; no acknowledgement follows.
        self.send_message(
            req_info,
            &[MSG_ID_VERSION],
            RequestOptions {
                no_ack: true,
                ..Default::default()
            },
        )
        .await?;
        self.wait_for(MSG_ID_VERSION, DEFAULT_TIMEOUT_MS).await?;
        Ok(self.versions())
    }

    /// Ask a channel for its claim status and wait for the report.
    pub async fn request_status(
        &mut self,
        index: ChannelIndex,
    ) -> Result<AddressClaim, GatewayError<L::Error>> {
        let commands = *self.channel_ref(index)?.commands();
        self.send_message(
            commands.req_info,
            &[INFO_SELECTOR_STATUS],
            RequestOptions {
                no_ack: true,
                ..Default::default()
            },
        )
        .await?;
        self.wait_for(commands.rep_status, DEFAULT_TIMEOUT_MS).await?;

        let channel = self.channel_ref(index)?;
        Ok(AddressClaim {
            channel: index,
            status: channel.claim_status(),
            address: channel.source_address(),
        })
    }

    /// Put a channel in listen-only mode (no address on the bus).
    pub async fn set_listen_mode(
        &mut self,
        index: ChannelIndex,
    ) -> Result<(), GatewayError<L::Error>> {
        let channel = self.channel_ref(index)?;
        let id = channel.commands().set_param1;
        let payload = channel.listen_only_payload();
        self.send_message(id, &payload, RequestOptions::default()).await
    }

    //==================================================================================PGN traffic

    /// Transmit a PGN message on a channel.
    pub async fn send_pgn(
        &mut self,
        index: ChannelIndex,
        pgn: u32,
        destination: u8,
        data: &[u8],
        options: &SendOptions,
    ) -> Result<(), GatewayError<L::Error>> {
        let (id, payload, len) = self.channel_ref(index)?.tx_message(pgn, destination, data, options)?;
        self.send_message(id, &payload[..len], RequestOptions::default())
            .await
    }

    /// Subscribe a batch of PGN filters on a channel.
    ///
    /// Every command is written and every acknowledgement awaited; when
    /// several fail, the first failure (in submission order) is reported and
    /// the siblings are still settled, never leaked. Only acknowledged
    /// filters are recorded in the channel's filter list.
    pub async fn add_filters(
        &mut self,
        index: ChannelIndex,
        pgns: &[u32],
    ) -> Result<(), GatewayError<L::Error>> {
        self.filter_batch(index, pgns, true).await
    }

    /// Remove a batch of PGN filters; same settlement rules as `add_filters`.
    pub async fn remove_filters(
        &mut self,
        index: ChannelIndex,
        pgns: &[u32],
    ) -> Result<(), GatewayError<L::Error>> {
        self.filter_batch(index, pgns, false).await
    }

    async fn filter_batch(
        &mut self,
        index: ChannelIndex,
        pgns: &[u32],
        add: bool,
    ) -> Result<(), GatewayError<L::Error>> {
        if pgns.len() > MAX_PENDING_REQUESTS {
            return Err(GatewayError::TooManyRequests);
        }
        let commands = *self.channel_ref(index)?.commands();
        let id = if add { commands.add_filter } else { commands.del_filter };
        let tracked = self.config.ack;

        let mut slots: [Option<SlotId>; MAX_PENDING_REQUESTS] = [None; MAX_PENDING_REQUESTS];
        for (i, &pgn) in pgns.iter().enumerate() {
            let payload = CanChannel::filter_payload(pgn);
            if let Err(err) = self.write_frame(id, &payload).await {
                self.abandon(&slots);
                return Err(err);
            }
            if tracked {
                let deadline = self.timer.now_ms() + DEFAULT_TIMEOUT_MS as u64;
                match self.tracker.register(id, KEY_ACK, deadline) {
                    Some(registered) => slots[i] = Some(registered),
                    None => {
                        self.abandon(&slots);
                        return Err(GatewayError::TooManyRequests);
                    }
                }
            }
        }

        while !slots
            .iter()
            .flatten()
            .all(|&slot| self.tracker.is_settled(slot))
        {
            if let Err(err) = self.pump_once().await {
                self.abandon(&slots);
                return Err(err);
            }
        }

        let mut first_error: Option<ResponseError> = None;
        for (&slot, &pgn) in slots.iter().zip(pgns) {
            let completion = match slot {
                Some(slot) => self.tracker.take(slot).unwrap_or(Ok(())),
                // Untracked writes count as delivered.
                None => Ok(()),
            };
            match completion {
                Ok(()) => {
                    let channel = self.channel_mut(index)?;
                    if add {
                        channel.note_filter_added(pgn);
                    } else {
                        channel.note_filter_removed(pgn);
                    }
                }
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(GatewayError::Response(err)),
            None => Ok(()),
        }
    }

    /// Drop a batch of registrations after an aborted operation.
    fn abandon(&mut self, slots: &[Option<SlotId>]) {
        for &slot in slots.iter().flatten() {
            self.tracker.remove(slot);
        }
    }

    //==================================================================================Tracked sends

    /// Encode and write one frame, then wait for its acknowledgement.
    ///
    /// When board acknowledgements are disabled or `options.no_ack` is set,
    /// the call returns as soon as the write completes.
    pub async fn send_message(
        &mut self,
        id: u8,
        payload: &[u8],
        options: RequestOptions,
    ) -> Result<(), GatewayError<L::Error>> {
        self.write_frame(id, payload).await?;
        if !self.config.ack || options.no_ack {
            return Ok(());
        }

        let deadline = self.timer.now_ms() + options.timeout_ms as u64;
        let slot = self
            .tracker
            .register(id, KEY_ACK, deadline)
            .ok_or(GatewayError::TooManyRequests)?;
        self.drive(slot).await
    }

    /// Wait for an unsolicited report carrying `msg_id` (status, version).
    pub async fn wait_for(
        &mut self,
        msg_id: u8,
        timeout_ms: u32,
    ) -> Result<(), GatewayError<L::Error>> {
        let deadline = self.timer.now_ms() + timeout_ms as u64;
        let slot = self
            .tracker
            .register(msg_id, KEY_NONE, deadline)
            .ok_or(GatewayError::TooManyRequests)?;
        self.drive(slot).await
    }

    async fn write_frame(&mut self, id: u8, payload: &[u8]) -> Result<(), GatewayError<L::Error>> {
        let mut buf = [0u8; MAX_ENCODED_FRAME];
        let len = encode_frame(id, payload, &mut buf)?;
        self.link
            .write(&buf[..len])
            .await
            .map_err(GatewayError::Link)
    }

    /// Pump the session until `slot` settles, then consume its completion.
    async fn drive(&mut self, slot: SlotId) -> Result<(), GatewayError<L::Error>> {
        loop {
            if let Some(completion) = self.tracker.take(slot) {
                return completion.map_err(GatewayError::from);
            }
            if let Err(err) = self.pump_once().await {
                self.tracker.remove(slot);
                return Err(err);
            }
        }
    }

    //==================================================================================Pump

    /// Pump inbound traffic once: one link read, or one deadline expiry,
    /// whichever comes first.
    pub async fn poll_inbound(&mut self) -> Result<(), GatewayError<L::Error>> {
        self.pump_once().await
    }

    /// Drive the session until the link fails or closes; unsolicited traffic
    /// (heartbeats, status reports, PGN messages) flows out as events.
    pub async fn run(&mut self) -> GatewayError<L::Error> {
        loop {
            if let Err(err) = self.pump_once().await {
                return err;
            }
        }
    }

    async fn pump_once(&mut self) -> Result<(), GatewayError<L::Error>> {
        let mut buf = [0u8; READ_CHUNK];

        let read = match self.tracker.next_deadline() {
            None => Some(self.link.read(&mut buf).await),
            Some(deadline) => {
                let wait = deadline
                    .saturating_sub(self.timer.now_ms())
                    .min(u32::MAX as u64) as u32;
                // Race the read against the earliest deadline; the loser is
                // dropped, which is why `SerialLink::read` must be
                // cancel-safe.
                let read = self.link.read(&mut buf);
                let delay = self.timer.delay_ms(wait);
                pin_mut!(read);
                pin_mut!(delay);
                match select(read, delay).await {
                    Either::Left((result, _)) => Some(result),
                    Either::Right(((), _)) => None,
                }
            }
        };

        if let Some(result) = read {
            let n = result.map_err(GatewayError::Link)?;
            if n == 0 {
                #[cfg(feature = "defmt")]
                defmt::warn!("Serial link closed");
                self.tracker.flush_all(ResponseError::Closed);
                return Err(GatewayError::LinkClosed);
            }
            self.process_chunk(&buf[..n]);
        }

        let now = self.timer.now_ms();
        self.tracker.expire(now);
        Ok(())
    }

    /// Feed one raw chunk through the decoder and dispatch every frame.
    /// Framing errors are counted and skipped; the decoder resynchronizes on
    /// the next start token.
    fn process_chunk(&mut self, chunk: &[u8]) {
        let events = self.events;
        let mut decoded = self.decoder.feed(chunk);
        while let Some(event) = decoded.next() {
            match event {
                DecodeEvent::Frame(pdu) => {
                    self.dispatcher.dispatch(
                        &pdu,
                        &mut self.tracker,
                        &mut self.can1,
                        self.can2.as_mut(),
                        |event| {
                            if let Some(sender) = &events {
                                let _ = sender.try_send(event);
                            }
                        },
                    );
                }
                DecodeEvent::Error(_err) => {
                    self.framing_errors = self.framing_errors.wrapping_add(1);
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Framing error on inbound stream");
                }
            }
        }
    }

    //==================================================================================Teardown

    /// Tear the session down: every in-flight request settles with
    /// [`ResponseError::Closed`] and the link is handed back to the caller.
    pub fn close(mut self) -> L {
        self.tracker.flush_all(ResponseError::Closed);
        self.link
    }
}
