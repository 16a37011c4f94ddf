use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::packer::{JsonPacker, Packer};

/// Frame header: magic (4) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "MBUS" (0x4d 0x42 0x55 0x53).
pub const MAGIC: [u8; 4] = *b"MBUS";

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Where the decoder is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Waiting for a full header.
    AwaitingHeader,
    /// Header accepted; waiting for `length` body bytes.
    AwaitingBody { length: usize },
}

/// Resumable frame decoder and encoder.
///
/// One codec lives per connection and cycles header -> body -> header for
/// every frame. `decode` can be driven with any read granularity: partial
/// headers stay in the source buffer, and an accepted header is remembered
/// until its body is complete.
pub struct FrameCodec {
    state: DecodeState,
    packer: Arc<dyn Packer>,
    max_payload_size: usize,
}

impl FrameCodec {
    /// Create a codec with the JSON packer and the default size limit.
    pub fn new() -> Self {
        Self::with_packer(Arc::new(JsonPacker))
    }

    /// Create a codec with an explicit body encoding.
    pub fn with_packer(packer: Arc<dyn Packer>) -> Self {
        Self {
            state: DecodeState::AwaitingHeader,
            packer,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }

    /// Override the maximum accepted body size.
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.max_payload_size = max_payload_size;
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Forget any half-parsed frame.
    pub fn reset(&mut self) {
        self.state = DecodeState::AwaitingHeader;
    }

    /// Try to decode the next message from `src`.
    ///
    /// - `Ok(None)`: more bytes are needed; nothing of a partial header is consumed.
    /// - `Ok(Some(msg))`: one frame was consumed and decoded.
    /// - `Err(_)`: the frame is malformed. The codec does not resynchronize;
    ///   the caller must discard the stream.
    pub fn decode<B: Buf>(&mut self, src: &mut B) -> Result<Option<Message>> {
        let length = match self.state {
            DecodeState::AwaitingBody { length } => length,
            DecodeState::AwaitingHeader => {
                if src.remaining() < HEADER_SIZE {
                    return Ok(None);
                }

                let mut header = [0u8; HEADER_SIZE];
                src.copy_to_slice(&mut header);
                let length = self.check_header(&header)?;
                self.state = DecodeState::AwaitingBody { length };
                length
            }
        };

        if src.remaining() < length {
            return Ok(None);
        }

        let body = src.copy_to_bytes(length);
        self.state = DecodeState::AwaitingHeader;

        let msg = self.packer.unpack(&body)?;
        trace!(id = msg.id(), method = msg.method(), size = length, "decoded frame");
        Ok(Some(msg))
    }

    /// Encode `msg` as a self-delimited frame appended to `dst`.
    pub fn encode(&self, msg: &Message, dst: &mut BytesMut) -> Result<()> {
        let body = self.packer.pack(msg)?;
        if body.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: body.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(&body, dst)
    }

    fn check_header(&self, header: &[u8; HEADER_SIZE]) -> Result<usize> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[..4]);
        if magic != MAGIC {
            return Err(FrameError::InvalidMagic { found: magic });
        }

        let mut length = [0u8; 4];
        length.copy_from_slice(&header[4..]);
        let length = u32::from_le_bytes(length) as usize;
        if length > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: length,
                max: self.max_payload_size,
            });
        }
        Ok(length)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCodec")
            .field("state", &self.state)
            .field("max_payload_size", &self.max_payload_size)
            .finish()
    }
}

/// Write a header and `body` into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬────────────┬──────────────────┐
/// │ Magic (4B)   │ Length     │ Body             │
/// │ "MBUS"       │ (4B LE)    │ (Length bytes)   │
/// └──────────────┴────────────┴──────────────────┘
/// ```
pub fn encode_frame(body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + body.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Initial writable size of the staging buffer.
    pub initial_buffer_size: usize,
    /// Read timeout for blocking operations. On a bus connection this is an
    /// idle timeout: a read that times out closes the connection.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            initial_buffer_size: crate::buffer::INITIAL_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
