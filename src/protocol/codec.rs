//! Incremental RCON Packet Codec
//!
//! This module turns packets into bytes and back. Decoding works against an
//! arbitrary buffer collected from a TCP stream, so it has to cope with
//! frames that have only partially arrived.
//!
//! ## How Decoding Works
//!
//! [`decode`] looks at the front of a buffer and returns either:
//! - `Ok(Some((packet, consumed)))` - a whole frame was present, `consumed` bytes were used
//! - `Ok(None)` - the size header or the rest of the frame is still missing
//! - `Err(CodecError)` - the bytes cannot be an RCON frame
//!
//! [`PacketDecoder`] wraps this for a `BytesMut` read buffer:
//! 1. Append incoming network data to the buffer
//! 2. Call `decode_all()` to pull out every complete frame
//! 3. Whatever is left stays buffered until the next read

use crate::protocol::types::{Packet, FRAME_OVERHEAD, MAX_PACKET_SIZE, SIZE_FIELD_LEN};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Errors that can occur while decoding RCON frames.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// The size field is too small to hold a frame, or larger than we accept
    #[error("invalid packet length: {0}")]
    InvalidLength(i32),

    /// The frame did not end with two null bytes
    #[error("packet missing null terminators")]
    MissingTerminator,
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes a packet into its wire format.
///
/// # Example
///
/// ```
/// use rconpool::protocol::{encode, packet_type};
///
/// let bytes = encode(1, packet_type::EXEC_COMMAND, "list");
/// assert_eq!(&bytes[..4], &14i32.to_le_bytes());
/// assert_eq!(&bytes[bytes.len() - 2..], &[0, 0]);
/// ```
pub fn encode(request_id: i32, packet_type: i32, body: &str) -> Bytes {
    let body = body.as_bytes();
    let mut buf = BytesMut::with_capacity(SIZE_FIELD_LEN + FRAME_OVERHEAD + body.len());

    buf.put_i32_le((FRAME_OVERHEAD + body.len()) as i32);
    buf.put_i32_le(request_id);
    buf.put_i32_le(packet_type);
    buf.put_slice(body);
    buf.put_u8(0);
    buf.put_u8(0);

    buf.freeze()
}

/// Attempts to decode one packet from the front of `buf`.
pub fn decode(buf: &[u8]) -> CodecResult<Option<(Packet, usize)>> {
    if buf.len() < SIZE_FIELD_LEN {
        return Ok(None);
    }

    let mut header = &buf[..SIZE_FIELD_LEN];
    let size = header.get_i32_le();

    if size < FRAME_OVERHEAD as i32 || size as usize > MAX_PACKET_SIZE {
        return Err(CodecError::InvalidLength(size));
    }

    let total = SIZE_FIELD_LEN + size as usize;
    if buf.len() < total {
        return Ok(None);
    }

    let mut frame = &buf[SIZE_FIELD_LEN..total];
    let request_id = frame.get_i32_le();
    let packet_type = frame.get_i32_le();

    // What remains is the body followed by the two terminators
    let (body, terminator) = frame.split_at(frame.len() - 2);
    if terminator != [0, 0] {
        return Err(CodecError::MissingTerminator);
    }

    let body = String::from_utf8_lossy(body).into_owned();
    Ok(Some((Packet::new(request_id, packet_type, body), total)))
}

/// Stateful decoder over a stream read buffer.
///
/// # Example
///
/// ```
/// use rconpool::protocol::{encode, packet_type, PacketDecoder};
///
/// let mut decoder = PacketDecoder::new();
/// let frame = encode(3, packet_type::RESPONSE_VALUE, "pong");
///
/// decoder.extend(&frame[..5]);
/// assert!(decoder.decode_all().unwrap().is_empty());
///
/// decoder.extend(&frame[5..]);
/// let packets = decoder.decode_all().unwrap();
/// assert_eq!(packets[0].body, "pong");
/// ```
#[derive(Debug, Default)]
pub struct PacketDecoder {
    buffer: BytesMut,
}

impl PacketDecoder {
    /// Creates a decoder with an empty buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Appends bytes received from the socket.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Mutable access to the underlying buffer, for `read_buf`.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Number of bytes waiting to be decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes the next complete packet, if one is buffered.
    pub fn next_packet(&mut self) -> CodecResult<Option<Packet>> {
        match decode(&self.buffer)? {
            Some((packet, consumed)) => {
                self.buffer.advance(consumed);
                Ok(Some(packet))
            }
            None => Ok(None),
        }
    }

    /// Decodes every complete packet currently buffered.
    ///
    /// Leftover bytes of an unfinished frame stay in the buffer.
    pub fn decode_all(&mut self) -> CodecResult<Vec<Packet>> {
        let mut packets = Vec::new();
        while let Some(packet) = self.next_packet()? {
            packets.push(packet);
        }
        Ok(packets)
    }
}
