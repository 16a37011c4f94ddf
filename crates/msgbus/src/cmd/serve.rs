use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use msgbus_frame::{MessagePtr, Payload};
use msgbus_rpc::{BusConnection, BusListener, Dispatcher};
use tracing::{debug, info};

use crate::cmd::ServeArgs;
use crate::exit::{connection_error, io_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

const ACCEPT_POLL: Duration = Duration::from_millis(50);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = BusListener::bind(args.addr.as_str())
        .map_err(|err| connection_error("bind failed", err))?
        .with_dispatcher(echo_dispatcher(!args.quiet, format));
    listener
        .set_nonblocking(true)
        .map_err(|err| io_error("listener setup failed", err))?;

    let addr = listener
        .local_addr()
        .map_err(|err| io_error("listener setup failed", err))?;
    info!(%addr, "serving");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut connections: Vec<BusConnection<TcpStream>> = Vec::new();
    while running.load(Ordering::SeqCst) {
        match listener.try_accept() {
            Ok(Some(conn)) => connections.push(conn),
            Ok(None) => thread::sleep(ACCEPT_POLL),
            Err(err) => return Err(connection_error("accept failed", err)),
        }
        connections.retain(|conn| !conn.is_closed());
    }

    debug!(open = connections.len(), "shutting down");
    Ok(SUCCESS)
}

/// Answers every request with its own payload.
fn echo_dispatcher(print: bool, format: OutputFormat) -> Dispatcher {
    Arc::new(move |request: MessagePtr| -> Option<Payload> {
        if print {
            print_message(request.id(), request.method(), request.data(), format);
        }
        Some(request.data().clone())
    })
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
