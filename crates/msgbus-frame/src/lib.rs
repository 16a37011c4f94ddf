//! Message model and length-prefixed framing for msgbus.
//!
//! Every message travels as one frame:
//! - A 4-byte magic number ("MBUS")
//! - A 4-byte little-endian body length
//! - The body, produced by a pluggable [`Packer`] (JSON by default)
//!
//! Incoming bytes are staged in a [`StagingBuffer`] and parsed by the
//! resumable [`FrameCodec`], so any read granularity works.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod buffer;
pub mod codec;
pub mod error;
pub mod message;
pub mod packer;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::BusCodec;
pub use buffer::StagingBuffer;
pub use codec::{
    encode_frame, DecodeState, FrameCodec, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC,
};
pub use error::{FrameError, Result};
pub use message::{Message, MessagePtr, MsgId, Payload, UNSET_ID};
pub use packer::{JsonPacker, Packer};
pub use reader::FrameReader;
pub use writer::FrameWriter;
