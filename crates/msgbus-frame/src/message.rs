use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Correlation identifier carried by every message.
pub type MsgId = u32;

/// String-keyed message payload. Key order carries no meaning.
pub type Payload = BTreeMap<String, String>;

/// Reserved id for messages that expect no response.
pub const UNSET_ID: MsgId = 0;

/// Shared handle to an immutable message.
///
/// A decoded response is referenced by both the I/O path and the caller
/// waiting for it.
pub type MessagePtr = Arc<Message>;

/// One bus message: correlation id, method name and payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MsgId,
    #[serde(default)]
    method: String,
    #[serde(default, rename = "data")]
    payload: Payload,
}

impl Message {
    /// Create an empty message with the unset id.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: MsgId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Create a request for `method` carrying `payload`.
    pub fn request(id: MsgId, method: impl Into<String>, payload: Payload) -> Self {
        Self {
            id,
            method: method.into(),
            payload,
        }
    }

    /// Create the response to `request`: same id, empty method.
    pub fn response_to(request: &Message, payload: Payload) -> Self {
        Self {
            id: request.id,
            method: String::new(),
            payload,
        }
    }

    pub fn id(&self) -> MsgId {
        self.id
    }

    pub fn set_id(&mut self, id: MsgId) {
        self.id = id;
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_method(&mut self, method: impl Into<String>) {
        self.method = method.into();
    }

    /// Responses are the messages without a method name.
    pub fn is_response(&self) -> bool {
        self.method.is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.payload.contains_key(key)
    }

    /// Insert or overwrite a payload entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.payload.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }

    pub fn data(&self) -> &Payload {
        &self.payload
    }

    /// Consume the message and keep only its payload.
    pub fn into_payload(self) -> Payload {
        self.payload
    }
}
