//! Wire codec tests: round trips, chunk splits, stuffing, and bad frames.
use super::*;

fn encode_to_vec(id: u8, payload: &[u8]) -> ([u8; MAX_ENCODED_FRAME], usize) {
    let mut out = [0u8; MAX_ENCODED_FRAME];
    let written = encode_frame(id, payload, &mut out).expect("encode must succeed");
    (out, written)
}

fn decode_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> (usize, Option<Pdu>) {
    let mut frames = 0;
    let mut last = None;
    for event in decoder.feed(bytes) {
        if let DecodeEvent::Frame(pdu) = event {
            frames += 1;
            last = Some(pdu);
        }
    }
    (frames, last)
}

#[test]
/// The documented example frame decodes to id 0x00, payload [0x05].
fn decodes_reference_frame() {
    let mut decoder = FrameDecoder::new();
    let (frames, pdu) = decode_all(&mut decoder, &[0xC0, 0x00, 0x03, 0x00, 0x05, 0xF8]);

    assert_eq!(frames, 1);
    let pdu = pdu.unwrap();
    assert_eq!(pdu.id, 0x00);
    assert_eq!(pdu.payload(), &[0x05]);
}

#[test]
/// Reset command checksum follows the two's-complement formula.
fn reset_frame_round_trip() {
    let payload = [0xA5, 0x69, 0x5A];
    let (encoded, written) = encode_to_vec(5, &payload);

    // ((~(len_hi + len_lo + id + payload)) + 1) & 0xFF
    let sum: u32 = 0 + 5 + 5 + 0xA5 + 0x69 + 0x5A;
    let expected_checksum = ((!(sum as u8)).wrapping_add(1)) as u8;
    assert_eq!(expected_checksum, checksum(&[0x00, 0x05, 0x05, 0xA5, 0x69, 0x5A]));
    // len = 5, no byte needs stuffing
    assert_eq!(
        &encoded[..written],
        &[0xC0, 0x00, 0x05, 0x05, 0xA5, 0x69, 0x5A, expected_checksum]
    );

    let mut decoder = FrameDecoder::new();
    let (frames, pdu) = decode_all(&mut decoder, &encoded[..written]);
    assert_eq!(frames, 1);
    let pdu = pdu.unwrap();
    assert_eq!(pdu.id, 5);
    assert_eq!(pdu.payload(), &payload);
}

#[test]
/// Payloads containing the START and ESC byte values survive a round trip.
fn round_trip_with_reserved_bytes() {
    let payload = [
        MSG_TOKEN_START,
        MSG_TOKEN_ESC,
        0x00,
        MSG_TOKEN_ESC,
        MSG_TOKEN_START,
        0xFF,
    ];
    let (encoded, written) = encode_to_vec(0x42, &payload);

    // No raw START may appear after the leading delimiter.
    assert!(!encoded[1..written].contains(&MSG_TOKEN_START));

    let mut decoder = FrameDecoder::new();
    let (frames, pdu) = decode_all(&mut decoder, &encoded[..written]);
    assert_eq!(frames, 1);
    let pdu = pdu.unwrap();
    assert_eq!(pdu.id, 0x42);
    assert_eq!(pdu.payload(), &payload);
}

#[test]
/// Splitting a frame at every byte boundary yields the same single message.
fn split_at_every_boundary() {
    let payload = [MSG_TOKEN_ESC, 0x01, MSG_TOKEN_START, 0x02];
    let (encoded, written) = encode_to_vec(7, &payload);

    for split in 1..written {
        let mut decoder = FrameDecoder::new();
        let (first, _) = decode_all(&mut decoder, &encoded[..split]);
        assert_eq!(first, 0, "no frame may complete at split {split}");

        let (frames, pdu) = decode_all(&mut decoder, &encoded[split..written]);
        assert_eq!(frames, 1, "split {split}");
        let pdu = pdu.unwrap();
        assert_eq!(pdu.id, 7);
        assert_eq!(pdu.payload(), &payload);
    }
}

#[test]
/// One-byte-at-a-time feeding decodes the same as a single chunk.
fn byte_at_a_time() {
    let payload = [1, 2, 3, 4, 5, 6, 7, 8];
    let (encoded, written) = encode_to_vec(3, &payload);

    let mut decoder = FrameDecoder::new();
    let mut frames = 0;
    for byte in &encoded[..written] {
        let (n, pdu) = decode_all(&mut decoder, core::slice::from_ref(byte));
        frames += n;
        if let Some(pdu) = pdu {
            assert_eq!(pdu.payload(), &payload);
        }
    }
    assert_eq!(frames, 1);
}

#[test]
/// Garbage before the first START is discarded.
fn leading_garbage_is_skipped() {
    let mut decoder = FrameDecoder::new();
    let (frames, pdu) = decode_all(
        &mut decoder,
        &[0xFF, 0xD9, 0x00, 0xC0, 0x00, 0x03, 0x00, 0x05, 0xF8],
    );
    assert_eq!(frames, 1);
    assert_eq!(pdu.unwrap().payload(), &[0x05]);
}

#[test]
/// A chunk without a START byte produces nothing.
fn no_start_no_frames() {
    let mut decoder = FrameDecoder::new();
    assert_eq!(decoder.feed(&[0x00, 0x41, 0xFF]).count(), 0);
}

#[test]
/// Two back-to-back frames in one chunk decode in order.
fn two_frames_in_one_chunk() {
    let mut decoder = FrameDecoder::new();
    let chunk = [
        0xC0, 0x00, 0x03, 0x00, 0x05, 0xF8, //
        0xC0, 0x00, 0x03, 0x00, 0x04, 0xF9,
    ];
    let frames: [Pdu; 2] = {
        let mut iter = decoder.feed(&chunk);
        let first = match iter.next() {
            Some(DecodeEvent::Frame(pdu)) => pdu,
            other => panic!("expected frame, got {other:?}"),
        };
        let second = match iter.next() {
            Some(DecodeEvent::Frame(pdu)) => pdu,
            other => panic!("expected frame, got {other:?}"),
        };
        assert!(iter.next().is_none());
        [first, second]
    };
    assert_eq!(frames[0].payload(), &[0x05]);
    assert_eq!(frames[1].payload(), &[0x04]);
}

#[test]
/// A corrupted checksum is reported and does not halt the following frame.
fn bad_checksum_does_not_abort_chunk() {
    let mut decoder = FrameDecoder::new();
    let chunk = [
        0xC0, 0x00, 0x03, 0x00, 0x05, 0xAA, // corrupt checksum (0xF8 expected)
        0xC0, 0x00, 0x03, 0x00, 0x04, 0xF9,
    ];
    let mut events = decoder.feed(&chunk);

    match events.next() {
        Some(DecodeEvent::Error(FramingError::ChecksumMismatch { expected, actual })) => {
            assert_eq!(expected, 0xF8);
            assert_eq!(actual, 0xAA);
        }
        other => panic!("expected checksum error, got {other:?}"),
    }
    match events.next() {
        Some(DecodeEvent::Frame(pdu)) => assert_eq!(pdu.payload(), &[0x04]),
        other => panic!("expected frame, got {other:?}"),
    }
}

#[test]
/// An incomplete segment abandoned by a new START is dropped silently.
fn truncated_segment_is_dropped() {
    let mut decoder = FrameDecoder::new();
    let chunk = [
        0xC0, 0x00, 0x08, 0x01, // declares 8 bytes, only the header arrives
        0xC0, 0x00, 0x03, 0x00, 0x05, 0xF8,
    ];
    let (frames, pdu) = decode_all(&mut decoder, &chunk);
    assert_eq!(frames, 1);
    assert_eq!(pdu.unwrap().payload(), &[0x05]);
}

#[test]
/// Bytes beyond the declared length are discarded, not queued.
fn excess_bytes_are_clamped() {
    let mut decoder = FrameDecoder::new();
    let chunk = [
        0xC0, 0x00, 0x03, 0x00, 0x05, 0xF8, 0xAA, 0xBB, // two trailing bytes
        0xC0, 0x00, 0x03, 0x00, 0x04, 0xF9,
    ];
    let mut events = decoder.feed(&chunk);
    match events.next() {
        Some(DecodeEvent::Frame(pdu)) => assert_eq!(pdu.payload(), &[0x05]),
        other => panic!("expected frame, got {other:?}"),
    }
    match events.next() {
        Some(DecodeEvent::Frame(pdu)) => assert_eq!(pdu.payload(), &[0x04]),
        other => panic!("expected frame, got {other:?}"),
    }
    assert!(events.next().is_none());
}

#[test]
/// A declared length beyond the buffer is an error, then decoding resumes.
fn oversized_declaration_resynchronizes() {
    let mut decoder = FrameDecoder::new();
    let chunk = [
        0xC0, 0x7F, 0xFF, // declares 32767 bytes
        0xC0, 0x00, 0x03, 0x00, 0x05, 0xF8,
    ];
    let mut events = decoder.feed(&chunk);
    match events.next() {
        Some(DecodeEvent::Error(FramingError::FrameTooLong { declared })) => {
            assert_eq!(declared, 0x7FFF);
        }
        other => panic!("expected length error, got {other:?}"),
    }
    match events.next() {
        Some(DecodeEvent::Frame(pdu)) => assert_eq!(pdu.payload(), &[0x05]),
        other => panic!("expected frame, got {other:?}"),
    }
}

#[test]
/// Encoding rejects a payload above the documented maximum.
fn encode_rejects_oversized_payload() {
    let payload = [0u8; MAX_PDU_PAYLOAD + 1];
    let mut out = [0u8; MAX_ENCODED_FRAME];
    assert_eq!(
        encode_frame(0, &payload, &mut out),
        Err(EncodeError::PayloadTooLong {
            len: MAX_PDU_PAYLOAD + 1,
            max: MAX_PDU_PAYLOAD
        })
    );
}

#[test]
/// Encoding fails cleanly when the output buffer is too small.
fn encode_rejects_small_buffer() {
    let mut out = [0u8; 4];
    assert_eq!(
        encode_frame(0, &[1, 2, 3], &mut out),
        Err(EncodeError::BufferTooSmall)
    );
}

#[test]
/// A maximum-size payload round-trips through encode and decode.
fn max_payload_round_trip() {
    let mut payload = [0u8; MAX_PDU_PAYLOAD];
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    let (encoded, written) = encode_to_vec(0x11, &payload);

    let mut decoder = FrameDecoder::new();
    let (frames, pdu) = decode_all(&mut decoder, &encoded[..written]);
    assert_eq!(frames, 1);
    let pdu = pdu.unwrap();
    assert_eq!(pdu.id, 0x11);
    assert_eq!(pdu.payload(), &payload[..]);
}
