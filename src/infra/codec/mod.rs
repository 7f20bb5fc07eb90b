//! Byte-stuffed wire codec for the serial gateway protocol.
//!
//! Wire format: `START len_hi len_lo id payload... checksum`, where every byte
//! after `START` is escaped when it collides with a framing token. `len` is a
//! big-endian 16-bit count equal to `payload_len + 2` (id and checksum), and
//! the checksum is the two's-complement sum over `len_hi len_lo id payload`.
//!
//! The decoder is an incremental state machine: it accepts arbitrary byte
//! chunks (several frames, partial frames, garbage between frames) and carries
//! partial state across calls, so a frame split at any byte boundary,
//! including inside an escape sequence, decodes identically to the whole
//! frame fed at once.
use crate::error::{EncodeError, FramingError};

//==================================================================================Constants

/// Start-of-frame token.
pub const MSG_TOKEN_START: u8 = 192;
/// Escape token.
pub const MSG_TOKEN_ESC: u8 = 219;
/// Escaped substitute for a START byte (`ESC, 220`).
pub const MSG_START_STUFF: u8 = 220;
/// Escaped substitute for an ESC byte (`ESC, 221`).
pub const MSG_ESC_STUFF: u8 = 221;

/// Minimum unstuffed length of a valid frame, START included.
pub const MIN_FRAME_LEN: usize = 6;

/// Hard per-frame payload maximum (id and checksum excluded).
///
/// The longest board message is a periodic loopback transmit carrying 1785
/// data bytes behind an 8-byte header (1793 bytes); the constant keeps a small
/// margin above that. [`encode_frame`] fails fast instead of truncating.
pub const MAX_PDU_PAYLOAD: usize = 1800;

/// Worst-case encoded size of a frame: START plus every other byte stuffed.
pub const MAX_ENCODED_FRAME: usize = 1 + 2 * (MAX_PDU_PAYLOAD + 4);

// Unstuffed segment capacity, START excluded: len(2) + id + payload + checksum.
const SEGMENT_CAP: usize = MAX_PDU_PAYLOAD + 4;

//==================================================================================Checksum

/// Two's-complement checksum: `((~sum_mod_256) + 1) & 0xFF`.
pub fn checksum(bytes: &[u8]) -> u8 {
    let mut sum = 0u8;
    for byte in bytes {
        sum = sum.wrapping_add(*byte);
    }
    (!sum).wrapping_add(1)
}

//==================================================================================Pdu

/// A validated wire unit: message identifier plus payload, produced only
/// after length and checksum validation succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    /// Message identifier (0-255).
    pub id: u8,
    data: [u8; MAX_PDU_PAYLOAD],
    len: usize,
}

impl Pdu {
    /// Build a PDU from an identifier and a payload slice.
    ///
    /// The payload is clamped to [`MAX_PDU_PAYLOAD`]; callers validate length
    /// beforehand on the encode path.
    pub fn new(id: u8, payload: &[u8]) -> Self {
        let mut data = [0; MAX_PDU_PAYLOAD];
        let len = payload.len().min(MAX_PDU_PAYLOAD);
        data[..len].copy_from_slice(&payload[..len]);
        Self { id, data, len }
    }

    /// Payload bytes, identifier excluded.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

//==================================================================================Encoder

/// Encode one complete, stuffed frame for `id` and `payload` into `out`.
///
/// Returns the number of bytes written. Fails with
/// [`EncodeError::PayloadTooLong`] above [`MAX_PDU_PAYLOAD`] and
/// [`EncodeError::BufferTooSmall`] when `out` cannot hold the stuffed frame;
/// nothing is ever silently truncated.
pub fn encode_frame(id: u8, payload: &[u8], out: &mut [u8]) -> Result<usize, EncodeError> {
    if payload.len() > MAX_PDU_PAYLOAD {
        return Err(EncodeError::PayloadTooLong {
            len: payload.len(),
            max: MAX_PDU_PAYLOAD,
        });
    }
    if out.is_empty() {
        return Err(EncodeError::BufferTooSmall);
    }

    let msg_len = payload.len() + 2;
    let len_hi = (msg_len >> 8) as u8;
    let len_lo = (msg_len & 0xFF) as u8;

    out[0] = MSG_TOKEN_START;
    let mut pos = 1;

    push_stuffed(out, &mut pos, len_hi)?;
    push_stuffed(out, &mut pos, len_lo)?;
    push_stuffed(out, &mut pos, id)?;
    for byte in payload {
        push_stuffed(out, &mut pos, *byte)?;
    }

    let mut sum = len_hi.wrapping_add(len_lo).wrapping_add(id);
    for byte in payload {
        sum = sum.wrapping_add(*byte);
    }
    push_stuffed(out, &mut pos, (!sum).wrapping_add(1))?;

    Ok(pos)
}

/// Append one byte, applying the escaping rules for START and ESC.
fn push_stuffed(out: &mut [u8], pos: &mut usize, byte: u8) -> Result<(), EncodeError> {
    let stuffed: &[u8] = match byte {
        MSG_TOKEN_START => &[MSG_TOKEN_ESC, MSG_START_STUFF],
        MSG_TOKEN_ESC => &[MSG_TOKEN_ESC, MSG_ESC_STUFF],
        _ => {
            if *pos >= out.len() {
                return Err(EncodeError::BufferTooSmall);
            }
            out[*pos] = byte;
            *pos += 1;
            return Ok(());
        }
    };

    if *pos + 2 > out.len() {
        return Err(EncodeError::BufferTooSmall);
    }
    out[*pos..*pos + 2].copy_from_slice(stuffed);
    *pos += 2;
    Ok(())
}

//==================================================================================Decoder

/// Outcome attached to one decoded segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A length- and checksum-valid frame.
    Frame(Pdu),
    /// A malformed segment; decoding continues with the next START.
    Error(FramingError),
}

/// Decoder phase for the segment currently being accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Waiting for a START byte; everything else is discarded.
    Hunting,
    /// Accumulating the unstuffed bytes of a segment.
    Collecting,
}

/// Incremental frame decoder with carry-over between chunks.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    /// Pending escape: the previous byte was ESC.
    escaped: bool,
    /// Unstuffed segment bytes, START excluded.
    segment: [u8; SEGMENT_CAP],
    filled: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Instantiate a decoder hunting for its first START byte.
    pub const fn new() -> Self {
        Self {
            state: DecodeState::Hunting,
            escaped: false,
            segment: [0; SEGMENT_CAP],
            filled: 0,
        }
    }

    /// Feed a chunk of raw serial bytes; iterate the resulting events.
    ///
    /// A chunk with no START and no carried segment produces no events. A
    /// checksum failure is reported as an event and never aborts the rest of
    /// the chunk.
    pub fn feed<'a>(&'a mut self, chunk: &'a [u8]) -> DecodeIter<'a> {
        DecodeIter {
            decoder: self,
            chunk,
            pos: 0,
        }
    }

    /// Discard any partially accumulated segment.
    pub fn reset(&mut self) {
        self.state = DecodeState::Hunting;
        self.escaped = false;
        self.filled = 0;
    }

    fn start_segment(&mut self) {
        // A START inside a segment abandons the incomplete predecessor:
        // short or truncated segments are rejected without raising.
        self.state = DecodeState::Collecting;
        self.escaped = false;
        self.filled = 0;
    }

    /// Consume one raw byte; may complete a segment.
    fn push(&mut self, byte: u8) -> Option<DecodeEvent> {
        if byte == MSG_TOKEN_START {
            self.start_segment();
            return None;
        }
        if self.state == DecodeState::Hunting {
            return None;
        }

        let value = if self.escaped {
            self.escaped = false;
            match byte {
                MSG_START_STUFF => MSG_TOKEN_START,
                MSG_ESC_STUFF => MSG_TOKEN_ESC,
                // Unknown escape: keep the byte literally.
                other => other,
            }
        } else if byte == MSG_TOKEN_ESC {
            self.escaped = true;
            return None;
        } else {
            byte
        };

        self.segment[self.filled] = value;
        self.filled += 1;
        self.check_complete()
    }

    /// Emit an event once the declared number of bytes has arrived.
    fn check_complete(&mut self) -> Option<DecodeEvent> {
        if self.filled < 2 {
            return None;
        }

        let declared = ((self.segment[0] as usize) << 8) | self.segment[1] as usize;

        // Degenerate length: the segment can never reach MIN_FRAME_LEN.
        // Reject silently and resynchronize on the next START.
        if declared + 3 < MIN_FRAME_LEN {
            self.reset();
            return None;
        }

        if declared + 2 > SEGMENT_CAP {
            self.reset();
            return Some(DecodeEvent::Error(FramingError::FrameTooLong { declared }));
        }

        // Segment layout: len(2) + id + payload(declared - 2) + checksum.
        if self.filled < declared + 2 {
            return None;
        }

        // Completing at exactly `declared + 2` bytes clamps over-long
        // segments by construction: trailing bytes before the next START
        // fall through the Hunting state and are discarded.
        let expected = checksum(&self.segment[..declared + 1]);
        let actual = self.segment[declared + 1];
        let event = if expected == actual {
            DecodeEvent::Frame(Pdu::new(
                self.segment[2],
                &self.segment[3..declared + 1],
            ))
        } else {
            DecodeEvent::Error(FramingError::ChecksumMismatch { expected, actual })
        };

        self.reset();
        Some(event)
    }
}

/// Iterator over the events produced while consuming one chunk.
pub struct DecodeIter<'a> {
    decoder: &'a mut FrameDecoder,
    chunk: &'a [u8],
    pos: usize,
}

impl Iterator for DecodeIter<'_> {
    type Item = DecodeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.chunk.len() {
            let byte = self.chunk[self.pos];
            self.pos += 1;
            if let Some(event) = self.decoder.push(byte) {
                return Some(event);
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
