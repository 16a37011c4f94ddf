use crate::error::{FrameError, Result};
use crate::message::Message;

/// Encodes messages to frame bodies and back.
///
/// The frame codec does not care about the body format; any structured
/// text or binary encoding that round-trips id, method and payload works.
pub trait Packer: Send + Sync {
    /// Serialize a message into body bytes.
    fn pack(&self, msg: &Message) -> Result<Vec<u8>>;

    /// Parse body bytes into a message.
    fn unpack(&self, body: &[u8]) -> Result<Message>;
}

/// JSON body encoding: `{"id": 1, "method": "echo", "data": {"k": "v"}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPacker;

impl Packer for JsonPacker {
    fn pack(&self, msg: &Message) -> Result<Vec<u8>> {
        serde_json::to_vec(msg).map_err(|err| FrameError::Encode(err.to_string()))
    }

    fn unpack(&self, body: &[u8]) -> Result<Message> {
        serde_json::from_slice(body).map_err(|err| FrameError::Decode(err.to_string()))
    }
}
