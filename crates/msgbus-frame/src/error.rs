/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header carries the wrong magic number.
    #[error("invalid frame magic {found:02x?} (expected \"MBUS\")")]
    InvalidMagic { found: [u8; 4] },

    /// The body length exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame body could not be decoded into a message.
    #[error("failed to decode message body: {0}")]
    Decode(String),

    /// The message could not be encoded into a frame body.
    #[error("failed to encode message body: {0}")]
    Encode(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors that mean the byte stream can no longer be trusted.
    ///
    /// The codec never resynchronizes, so the owner of the stream must reset
    /// its staging buffer and close the connection.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidMagic { .. } | FrameError::PayloadTooLarge { .. } | FrameError::Decode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
