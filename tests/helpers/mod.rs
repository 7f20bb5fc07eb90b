/// Test doubles to simulate the serial link and timer during integration
/// tests, plus a scripted gateway board speaking the real wire format.
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration, Instant};

use jgate1939::infra::codec::{encode_frame, DecodeEvent, FrameDecoder, MAX_ENCODED_FRAME};
use jgate1939::protocol::traits::{LinkTimer, SerialLink};

#[derive(Clone)]
#[allow(dead_code)]
/// In-memory byte stream reproducing the `SerialLink` trait behavior.
pub struct MockSerialLink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
    pending: VecDeque<u8>,
}

#[allow(dead_code)]
impl MockSerialLink {
    /// Construct a pair of interconnected links (DUT ↔ host).
    pub fn create_pair() -> (Self, Self) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();

        let dut_link = Self {
            tx: dut_tx,
            rx: Arc::new(Mutex::new(dut_rx)),
            pending: VecDeque::new(),
        };

        let host_link = Self {
            tx: host_tx,
            rx: Arc::new(Mutex::new(host_rx)),
            pending: VecDeque::new(),
        };

        (dut_link, host_link)
    }
}

impl SerialLink for MockSerialLink {
    type Error = ();

    async fn write<'a>(&'a mut self, bytes: &'a [u8]) -> Result<(), Self::Error> {
        self.tx.send(bytes.to_vec()).map_err(|_| ())
    }

    async fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> Result<usize, Self::Error> {
        if self.pending.is_empty() {
            let mut rx = self.rx.lock().await;
            match rx.recv().await {
                Some(chunk) => self.pending.extend(chunk),
                // Peer dropped: end of stream.
                None => return Ok(0),
            }
        }
        let mut n = 0;
        while n < buf.len() {
            match self.pending.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

#[allow(dead_code)]
/// Timer based on `tokio::time` so paused-clock tests drive deadlines.
pub struct MockTimer {
    epoch: Instant,
}

#[allow(dead_code)]
impl MockTimer {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl LinkTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

#[allow(dead_code)]
/// Scripted gateway board on the host side of a link pair: decodes the
/// driver's frames and replies with properly framed reports.
pub struct FakeBoard {
    link: MockSerialLink,
    decoder: FrameDecoder,
    inbox: VecDeque<(u8, Vec<u8>)>,
}

#[allow(dead_code)]
impl FakeBoard {
    pub fn new(link: MockSerialLink) -> Self {
        Self {
            link,
            decoder: FrameDecoder::new(),
            inbox: VecDeque::new(),
        }
    }

    /// Next decoded command from the driver, as `(id, payload)`.
    pub async fn next_command(&mut self) -> (u8, Vec<u8>) {
        loop {
            if let Some(command) = self.inbox.pop_front() {
                return command;
            }
            let mut buf = [0u8; 512];
            let n = self
                .link
                .read(&mut buf)
                .await
                .expect("board link must not fail");
            assert!(n > 0, "driver closed the link while a command was expected");
            for event in self.decoder.feed(&buf[..n]) {
                if let DecodeEvent::Frame(pdu) = event {
                    self.inbox.push_back((pdu.id, pdu.payload().to_vec()));
                }
            }
        }
    }

    /// Next command, asserting its identifier.
    pub async fn expect_command(&mut self, id: u8) -> Vec<u8> {
        let (actual, payload) = self.next_command().await;
        assert_eq!(actual, id, "unexpected command identifier");
        payload
    }

    /// Reply with one framed message.
    pub async fn send(&mut self, id: u8, payload: &[u8]) {
        let mut buf = [0u8; MAX_ENCODED_FRAME];
        let len = encode_frame(id, payload, &mut buf).expect("reply must encode");
        self.link
            .write(&buf[..len])
            .await
            .expect("board link must accept the reply");
    }

    /// Reply with several framed messages delivered as a single chunk.
    pub async fn send_all(&mut self, replies: &[(u8, &[u8])]) {
        let mut chunk = Vec::new();
        for &(id, payload) in replies {
            let mut buf = [0u8; MAX_ENCODED_FRAME];
            let len = encode_frame(id, payload, &mut buf).expect("reply must encode");
            chunk.extend_from_slice(&buf[..len]);
        }
        self.link
            .write(&chunk)
            .await
            .expect("board link must accept the reply");
    }

    /// Acknowledge a command by echoing its identifier.
    pub async fn ack(&mut self, target: u8) {
        self.send(0, &[target]).await;
    }
}
