//! Minimal echo server: answers every request with its own payload.
//!
//! Run with:
//!   cargo run -p msgbus --example echo-server
//!
//! In another terminal:
//!   cargo run -p msgbus --features cli -- call greet --set name=ada

use std::sync::Arc;

use msgbus::frame::MessagePtr;
use msgbus::rpc::{BusListener, Dispatcher};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dispatcher: Dispatcher = Arc::new(|request: MessagePtr| {
        eprintln!(
            "request id={} method={} keys={}",
            request.id(),
            request.method(),
            request.data().len()
        );
        Some(request.data().clone())
    });

    let listener = BusListener::bind("127.0.0.1:7878")?.with_dispatcher(dispatcher);
    eprintln!("Listening on {}", listener.local_addr()?);

    // Serve one client until it disconnects.
    let mut conn = listener.accept()?;
    conn.wait();
    eprintln!("Client disconnected");
    Ok(())
}
