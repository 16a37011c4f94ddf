use std::time::Duration;

/// Failure outcome of a call.
///
/// Cloneable so that one outcome can be observed from several handles to
/// the same pending slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// The call was rejected before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No response arrived before the caller's deadline.
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// The connection was lost, or never usable, while the call was pending.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, RpcError>;

/// Errors from establishing a bus connection.
///
/// Once a connection runs, its failures reach callers as
/// [`RpcError::Unavailable`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Socket-level error while connecting, accepting or starting the I/O
    /// thread.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;
