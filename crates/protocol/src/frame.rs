//! Binary framing for the TCP transport.
//!
//! ```text
//! | magic u16 | ver u8 | flags u8 | cmd u16 | seq u32 | body_len u32 | crc16 u16 | body |
//! ```
//!
//! All header fields are big-endian. The CRC (CRC-16/CCITT-FALSE) covers the
//! first 14 header bytes. Any header that fails validation poisons the
//! decoder: the buffer cannot be resynchronized, so the caller must drop the
//! connection.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const MAGIC: u16 = 0xEF89;
pub const PROTOCOL_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 16;
/// Bodies above this are rejected before any allocation.
pub const MAX_BODY_LEN: u32 = 4 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid magic number {0:#06x}")]
    BadMagic(u16),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("header checksum mismatch")]
    ChecksumMismatch,
    #[error("body length {0} exceeds limit")]
    BodyTooLarge(u32),
}

/// One complete application frame as read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u16,
    pub sequence: u32,
    pub body: Bytes,
}

/// CRC-16/CCITT-FALSE: init 0xFFFF, poly 0x1021, no reflection, no xorout.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Encode a single frame, computing the header CRC.
pub fn encode_frame(command: u16, sequence: u32, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_u16(MAGIC);
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_u8(0); // flags, reserved
    buf.put_u16(command);
    buf.put_u32(sequence);
    buf.put_u32(body.len() as u32);
    let crc = crc16_ccitt(&buf[..14]);
    buf.put_u16(crc);
    buf.put_slice(body);
    buf.freeze()
}

/// Stateful decoder for the TCP byte stream. Buffers partial input and
/// yields every complete frame per feed.
#[derive(Default)]
pub struct FrameCodec {
    buf: BytesMut,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Append raw bytes and decode as many complete frames as possible.
    ///
    /// On error the internal buffer is cleared; the stream is no longer
    /// frame-aligned and the connection must be closed.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Frame>, FrameError> {
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            if self.buf.len() < HEADER_LEN {
                break;
            }

            let header = &self.buf[..HEADER_LEN];
            if let Err(err) = validate_header(header) {
                self.buf.clear();
                return Err(err);
            }

            let body_len = u32::from_be_bytes([header[10], header[11], header[12], header[13]]) as usize;
            if self.buf.len() < HEADER_LEN + body_len {
                break;
            }

            let mut frame = self.buf.split_to(HEADER_LEN + body_len);
            let command = u16::from_be_bytes([frame[4], frame[5]]);
            let sequence = u32::from_be_bytes([frame[6], frame[7], frame[8], frame[9]]);
            frame.advance(HEADER_LEN);
            frames.push(Frame {
                command,
                sequence,
                body: frame.freeze(),
            });
        }

        Ok(frames)
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn validate_header(header: &[u8]) -> Result<(), FrameError> {
    let magic = u16::from_be_bytes([header[0], header[1]]);
    if magic != MAGIC {
        return Err(FrameError::BadMagic(magic));
    }
    if header[2] != PROTOCOL_VERSION {
        return Err(FrameError::UnsupportedVersion(header[2]));
    }
    let crc = u16::from_be_bytes([header[14], header[15]]);
    if crc != crc16_ccitt(&header[..14]) {
        return Err(FrameError::ChecksumMismatch);
    }
    let body_len = u32::from_be_bytes([header[10], header[11], header[12], header[13]]);
    if body_len > MAX_BODY_LEN {
        return Err(FrameError::BodyTooLarge(body_len));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_matches_reference_vector() {
        // CRC-16/CCITT-FALSE check value for "123456789".
        assert_eq!(crc16_ccitt(b"123456789"), 0x29B1);
    }

    #[test]
    fn encodes_and_decodes_a_frame() {
        let encoded = encode_frame(0x20, 7, b"hello");
        assert_eq!(encoded.len(), HEADER_LEN + 5);

        let mut codec = FrameCodec::new();
        let frames = codec.feed(&encoded).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, 0x20);
        assert_eq!(frames[0].sequence, 7);
        assert_eq!(&frames[0].body[..], b"hello");
        assert_eq!(codec.buffered(), 0);
    }

    #[test]
    fn decodes_fragmented_input() {
        let encoded = encode_frame(0x10, 1, b"token-bytes");
        let mut codec = FrameCodec::new();

        let frames = codec.feed(&encoded[..9]).unwrap();
        assert!(frames.is_empty());
        let frames = codec.feed(&encoded[9..20]).unwrap();
        assert!(frames.is_empty());
        let frames = codec.feed(&encoded[20..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].body[..], b"token-bytes");
    }

    #[test]
    fn decodes_multiple_frames_in_one_feed() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode_frame(0x05, 1, b""));
        stream.extend_from_slice(&encode_frame(0x20, 2, b"abc"));
        stream.extend_from_slice(&encode_frame(0x20, 3, b"defgh"));

        let mut codec = FrameCodec::new();
        let frames = codec.feed(&stream).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].sequence, 1);
        assert_eq!(&frames[2].body[..], b"defgh");
    }

    #[test]
    fn rejects_bad_magic_and_clears_buffer() {
        let mut encoded = encode_frame(0x20, 1, b"x").to_vec();
        encoded[0] = 0xAA;

        let mut codec = FrameCodec::new();
        assert_eq!(codec.feed(&encoded), Err(FrameError::BadMagic(0xAA89)));
        assert_eq!(codec.buffered(), 0);
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut encoded = encode_frame(0x20, 1, b"x").to_vec();
        encoded[2] = 9;
        // Recompute the CRC so only the version check can fail.
        let crc = crc16_ccitt(&encoded[..14]);
        encoded[14..16].copy_from_slice(&crc.to_be_bytes());

        let mut codec = FrameCodec::new();
        assert_eq!(codec.feed(&encoded), Err(FrameError::UnsupportedVersion(9)));
    }

    #[test]
    fn rejects_corrupted_header() {
        let mut encoded = encode_frame(0x20, 1, b"x").to_vec();
        encoded[7] ^= 0xFF; // flip a sequence byte, invalidating the CRC

        let mut codec = FrameCodec::new();
        assert_eq!(codec.feed(&encoded), Err(FrameError::ChecksumMismatch));
    }

    #[test]
    fn rejects_oversized_body() {
        let mut header = BytesMut::new();
        header.put_u16(MAGIC);
        header.put_u8(PROTOCOL_VERSION);
        header.put_u8(0);
        header.put_u16(0x20);
        header.put_u32(1);
        header.put_u32(MAX_BODY_LEN + 1);
        let crc = crc16_ccitt(&header[..14]);
        header.put_u16(crc);

        let mut codec = FrameCodec::new();
        assert_eq!(
            codec.feed(&header),
            Err(FrameError::BodyTooLarge(MAX_BODY_LEN + 1))
        );
    }

    #[test]
    fn empty_body_round_trips() {
        let encoded = encode_frame(0x05, 42, b"");
        let mut codec = FrameCodec::new();
        let frames = codec.feed(&encoded).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].body.is_empty());
    }
}
