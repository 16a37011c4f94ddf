//! A lightweight message-bus protocol layer.
//!
//! Messages carry a correlation id, a method name and a string map payload.
//! They travel as length-prefixed frames and calls are matched to their
//! responses by id, so many calls can be in flight on one connection.
//!
//! # Crate Structure
//!
//! - [`frame`]: staging buffer, message model and the frame codec
//! - [`rpc`]: invocation router and connection handling (behind `rpc` feature)

/// Re-export frame types.
pub mod frame {
    pub use msgbus_frame::*;
}

/// Re-export call routing and connection types (requires `rpc` feature).
#[cfg(feature = "rpc")]
pub mod rpc {
    pub use msgbus_rpc::*;
}
