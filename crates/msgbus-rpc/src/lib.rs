//! Request/response routing for msgbus connections.
//!
//! [`BusInvoker`] assigns correlation ids to outgoing requests and matches
//! responses back to their callers, in any order and from any thread.
//! [`BusConnection`] drives one stream: it owns the I/O thread that decodes
//! frames, routes responses to the invoker and hands requests to a
//! [`Dispatcher`].

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod invoker;
pub mod listener;
mod slot;
pub mod stream;

pub use config::{ConnectionConfig, InvokerConfig, DEFAULT_CALL_TIMEOUT};
pub use connection::{BusConnection, Dispatcher};
#[cfg(unix)]
pub use connector::connect_unix;
pub use connector::{connect, connect_with_config};
pub use error::{ConnectionError, ConnectionResult, Result, RpcError};
pub use invoker::{BusInvoker, MsgWriter};
pub use listener::BusListener;
pub use slot::CallHandle;
pub use stream::BusStream;
