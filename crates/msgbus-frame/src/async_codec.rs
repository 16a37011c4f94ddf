//! `tokio_util::codec` adapter over the frame state machine.

use std::sync::Arc;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{DecodeState, FrameCodec};
use crate::error::FrameError;
use crate::message::Message;
use crate::packer::Packer;

/// Frame codec for `Framed` async streams.
#[derive(Debug, Default)]
pub struct BusCodec {
    inner: FrameCodec,
}

impl BusCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packer(packer: Arc<dyn Packer>) -> Self {
        Self {
            inner: FrameCodec::with_packer(packer),
        }
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.inner.set_max_payload_size(max_payload_size);
        self
    }
}

impl Decoder for BusCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, FrameError> {
        let decoded = self.inner.decode(src)?;
        if decoded.is_none() {
            if let DecodeState::AwaitingBody { length } = self.inner.state() {
                src.reserve(length.saturating_sub(src.len()));
            }
        }
        Ok(decoded)
    }
}

impl Encoder<Message> for BusCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), FrameError> {
        self.inner.encode(&item, dst)
    }
}

impl<'a> Encoder<&'a Message> for BusCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &'a Message, dst: &mut BytesMut) -> Result<(), FrameError> {
        self.inner.encode(item, dst)
    }
}
