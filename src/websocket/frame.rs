//! WebSocket framing (RFC 6455, section 5) for an upgraded connection.
//!
//! Only the subset the controller needs is supported:
//!
//! - client frames must be masked and carry FIN (no fragmented messages);
//! - payload lengths use the 7-bit or 16-bit form, the 64-bit form is refused;
//! - server frames are never masked and use the 2 or 4 byte header.

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Largest payload a single frame can carry with a 16-bit length.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Close frame with status 1000 (normal closure).
pub const CLOSE_FRAME: [u8; 4] = [0x88, 0x02, 0x03, 0xE8];

const FIN: u8 = 0x80;
const MASK: u8 = 0x80;
const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Opcodes accepted from a client.
    fn is_decodable(self) -> bool {
        matches!(
            self,
            Opcode::Continuation | Opcode::Text | Opcode::Binary | Opcode::Close
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame without FIN bit, fragmented messages are not supported")]
    MissingFin,
    #[error("client frame is not masked")]
    Unmasked,
    #[error("64-bit payload length is not supported")]
    Unsupported64BitLength,
    #[error("unsupported opcode {0:#x}")]
    UnknownOpcode(u8),
    #[error("payload of {needed} bytes does not fit in {capacity} bytes")]
    BufferTooSmall { needed: usize, capacity: usize },
    #[error("payload of {0} bytes exceeds a 16-bit frame length")]
    PayloadTooLarge(usize),
}

/// Outcome of a successful [`FrameDecoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Not enough bytes buffered for a whole frame yet.
    NeedMore,
    /// A frame was decoded; this many unmasked payload bytes were written.
    Payload(usize),
    /// The peer sent a close frame.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Header,
    Body,
}

/// Incremental frame decoder.
///
/// Raw bytes are appended with [`extend`](FrameDecoder::extend) (or read
/// straight into [`buffer_mut`](FrameDecoder::buffer_mut)). Each
/// [`decode`](FrameDecoder::decode) consumes at most one frame; bytes beyond
/// it stay buffered for the next call.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    buf: BytesMut,
    opcode: Opcode,
    payload_len: usize,
    mask_offset: usize,
    payload_offset: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Header,
            buf: BytesMut::with_capacity(1024),
            opcode: Opcode::Text,
            payload_len: 0,
            mask_offset: 0,
            payload_offset: 0,
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Bytes received but not yet consumed by a decoded frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Opcode of the frame being (or last) decoded.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Decodes the next frame, writing its unmasked payload to `out`.
    ///
    /// A payload exactly `out.len()` bytes long is accepted; a longer one is
    /// [`FrameError::BufferTooSmall`].
    pub fn decode(&mut self, out: &mut [u8]) -> Result<Decoded, FrameError> {
        if self.state == DecodeState::Header && !self.parse_header(out.len())? {
            return Ok(Decoded::NeedMore);
        }

        let end = self.payload_offset + self.payload_len;
        if self.buf.len() < end {
            return Ok(Decoded::NeedMore);
        }

        let frame = self.buf.split_to(end);
        self.state = DecodeState::Header;

        if self.opcode == Opcode::Close {
            return Ok(Decoded::Close);
        }

        let mask = &frame[self.mask_offset..self.payload_offset];
        let payload = &frame[self.payload_offset..];
        for (i, (dst, src)) in out.iter_mut().zip(payload).enumerate() {
            *dst = src ^ mask[i % 4];
        }

        Ok(Decoded::Payload(self.payload_len))
    }

    /// Lays out the frame header. Returns `false` when more bytes are needed.
    fn parse_header(&mut self, capacity: usize) -> Result<bool, FrameError> {
        if self.buf.len() < 2 {
            return Ok(false);
        }

        let (b0, b1) = (self.buf[0], self.buf[1]);
        if b0 & FIN == 0 {
            return Err(FrameError::MissingFin);
        }
        if b1 & MASK == 0 {
            return Err(FrameError::Unmasked);
        }

        let (payload_len, mask_offset) = match b1 & 0x7F {
            LEN_64 => return Err(FrameError::Unsupported64BitLength),
            LEN_16 => {
                if self.buf.len() < 4 {
                    return Ok(false);
                }
                (u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize, 4)
            }
            len => (len as usize, 2),
        };

        let opcode = Opcode::from_u8(b0 & 0x0F)
            .filter(|op| op.is_decodable())
            .ok_or(FrameError::UnknownOpcode(b0 & 0x0F))?;

        if opcode != Opcode::Close && payload_len > capacity {
            return Err(FrameError::BufferTooSmall {
                needed: payload_len,
                capacity,
            });
        }

        self.opcode = opcode;
        self.payload_len = payload_len;
        self.mask_offset = mask_offset;
        self.payload_offset = mask_offset + 4;
        self.state = DecodeState::Body;
        Ok(true)
    }
}

/// Encodes `data` as one unmasked server frame.
pub fn encode_frame(data: &[u8], opcode: Opcode) -> Result<BytesMut, FrameError> {
    if data.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge(data.len()));
    }

    let mut frame = BytesMut::with_capacity(data.len() + 4);
    put_frame(&mut frame, data, opcode);
    Ok(frame)
}

/// Encodes `data` as as many frames as its length requires, each carrying
/// at most [`MAX_PAYLOAD`] bytes.
pub fn encode_chunked(data: &[u8], opcode: Opcode) -> Vec<BytesMut> {
    data.chunks(MAX_PAYLOAD)
        .map(|chunk| {
            let mut frame = BytesMut::with_capacity(chunk.len() + 4);
            put_frame(&mut frame, chunk, opcode);
            frame
        })
        .collect()
}

/// Sends one frame, retrying partial writes until every byte is out.
pub async fn write_frame<W>(writer: &mut W, data: &[u8], opcode: Opcode) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(data, opcode)?;
    writer.write_all(&frame).await?;
    Ok(())
}

fn put_frame(frame: &mut BytesMut, data: &[u8], opcode: Opcode) {
    frame.put_u8(FIN | opcode as u8);
    if data.len() < LEN_16 as usize {
        frame.put_u8(data.len() as u8);
    } else {
        frame.put_u8(LEN_16);
        frame.put_u16(data.len() as u16);
    }
    frame.put_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masked(opcode: u8, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
        let mut frame = vec![0x80 | opcode];
        if payload.len() < 126 {
            frame.push(0x80 | payload.len() as u8);
        } else {
            frame.push(0x80 | 126);
            frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        frame.extend_from_slice(&mask);
        frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
        frame
    }

    #[test]
    fn header_split_across_reads() {
        let frame = masked(0x1, b"M114\n", [1, 2, 3, 4]);
        let mut decoder = FrameDecoder::new();
        let mut out = [0u8; 16];

        decoder.extend(&frame[..1]);
        assert_eq!(decoder.decode(&mut out), Ok(Decoded::NeedMore));
        decoder.extend(&frame[1..4]);
        assert_eq!(decoder.decode(&mut out), Ok(Decoded::NeedMore));
        decoder.extend(&frame[4..]);
        assert_eq!(decoder.decode(&mut out), Ok(Decoded::Payload(5)));
        assert_eq!(&out[..5], b"M114\n");
    }

    #[test]
    fn extended_length_frame() {
        let payload = vec![b'x'; 300];
        let mut decoder = FrameDecoder::new();
        decoder.extend(&masked(0x2, &payload, [9, 8, 7, 6]));

        let mut out = vec![0u8; 300];
        assert_eq!(decoder.decode(&mut out), Ok(Decoded::Payload(300)));
        assert_eq!(out, payload);
    }

    #[test]
    fn sixteen_bit_header_layout() {
        let frame = encode_frame(&[0u8; 200], Opcode::Text).unwrap();
        assert_eq!(&frame[..4], &[0x81, 126, 0, 200]);
        assert_eq!(frame.len(), 204);
    }
}
