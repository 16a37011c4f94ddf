use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use msgbus_frame::{FrameError, FrameReader, FrameWriter, Message, MessagePtr, Payload, UNSET_ID};
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionResult, Result, RpcError};
use crate::invoker::{BusInvoker, MsgWriter};
use crate::slot::CallHandle;
use crate::stream::BusStream;

/// Receives inbound requests (messages with a method name).
///
/// Runs on the connection's I/O thread. Returning `Some(payload)` sends a
/// response with the request's id, unless the request was fire-and-forget
/// (id 0). A dispatcher must not block on calls over the same connection,
/// since responses are read by the thread it runs on.
pub type Dispatcher = Arc<dyn Fn(MessagePtr) -> Option<Payload> + Send + Sync>;

type SharedWriter<S> = Arc<Mutex<FrameWriter<S>>>;

/// One live bus connection: an I/O thread plus an invocation router.
///
/// The I/O thread owns the staging buffer and codec. Complete responses go
/// to the router; requests go to the dispatcher. When the stream ends or a
/// malformed frame arrives, the socket is shut down and every pending call
/// fails with `Unavailable`.
pub struct BusConnection<S: BusStream> {
    invoker: Arc<BusInvoker>,
    control: S,
    closed: Arc<AtomicBool>,
    io_thread: Option<JoinHandle<()>>,
}

impl<S: BusStream> BusConnection<S> {
    /// Start the I/O thread on `stream`.
    pub fn start(
        stream: S,
        config: ConnectionConfig,
        dispatcher: Option<Dispatcher>,
    ) -> ConnectionResult<Self> {
        stream.set_stream_read_timeout(config.frame.read_timeout)?;
        stream.set_stream_write_timeout(config.frame.write_timeout)?;
        let read_half = stream.try_clone_stream()?;
        let control = stream.try_clone_stream()?;

        let writer: SharedWriter<S> = Arc::new(Mutex::new(FrameWriter::with_config(
            stream,
            config.frame.clone(),
        )));
        let reader = FrameReader::with_config(read_half, config.frame);

        let name = config.invoker.name.clone();
        let invoker = Arc::new(BusInvoker::new(config.invoker));
        invoker.set_msg_writer(msg_writer(Arc::clone(&writer)));

        let closed = Arc::new(AtomicBool::new(false));
        let io_thread = {
            let io = IoLoop {
                reader,
                writer,
                invoker: Arc::clone(&invoker),
                dispatcher,
                closed: Arc::clone(&closed),
            };
            thread::Builder::new()
                .name(format!("{name}-io"))
                .spawn(move || io.run())?
        };

        debug!(connection = %name, "connection started");
        Ok(Self {
            invoker,
            control,
            closed,
            io_thread: Some(io_thread),
        })
    }

    /// The router issuing calls over this connection.
    pub fn invoker(&self) -> &Arc<BusInvoker> {
        &self.invoker
    }

    pub fn call(&self, method: &str, input: Payload) -> Result<Payload> {
        self.invoker.call(method, input)
    }

    pub fn call_with_timeout(
        &self,
        method: &str,
        input: Payload,
        timeout: Duration,
    ) -> Result<Payload> {
        self.invoker.call_with_timeout(method, input, timeout)
    }

    pub fn acall(&self, method: &str, input: Payload) -> Result<CallHandle> {
        self.invoker.acall(method, input)
    }

    pub fn notify(&self, method: &str, input: Payload) -> Result<()> {
        self.invoker.notify(method, input)
    }

    /// True once the I/O thread has stopped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Block until the peer closes the connection or it fails.
    pub fn wait(&mut self) {
        if let Some(handle) = self.io_thread.take() {
            self.join_io(handle);
        }
    }

    /// Shut the socket down and wait for the I/O thread to finish.
    ///
    /// Every call still pending resolves with `Unavailable`.
    pub fn close(&mut self) {
        let Some(handle) = self.io_thread.take() else {
            return;
        };
        if let Err(err) = self.control.shutdown_stream() {
            if err.kind() != ErrorKind::NotConnected {
                debug!(connection = %self.invoker.name(), error = %err, "shutdown failed");
            }
        }
        self.join_io(handle);
    }

    fn join_io(&self, handle: JoinHandle<()>) {
        if handle.join().is_err() {
            warn!(connection = %self.invoker.name(), "I/O thread panicked");
            self.closed.store(true, Ordering::SeqCst);
            self.invoker.clear_msg_writer();
            self.invoker.fail_all("connection I/O thread panicked");
        }
    }
}

impl<S: BusStream> Drop for BusConnection<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: BusStream> std::fmt::Debug for BusConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusConnection")
            .field("name", &self.invoker.name())
            .field("closed", &self.is_closed())
            .field("pending", &self.invoker.pending_count())
            .finish()
    }
}

struct IoLoop<S: BusStream> {
    reader: FrameReader<S>,
    writer: SharedWriter<S>,
    invoker: Arc<BusInvoker>,
    dispatcher: Option<Dispatcher>,
    closed: Arc<AtomicBool>,
}

impl<S: BusStream> IoLoop<S> {
    fn run(mut self) {
        let name = self.invoker.name().to_string();
        let reason = loop {
            let msg = match self.reader.read_message() {
                Ok(msg) => Arc::new(msg),
                Err(FrameError::ConnectionClosed) => {
                    debug!(connection = %name, "peer closed connection");
                    break "connection closed by peer".to_string();
                }
                Err(err) if err.is_malformed() => {
                    warn!(connection = %name, error = %err, "malformed frame; closing connection");
                    break format!("malformed frame: {err}");
                }
                Err(err) => {
                    debug!(connection = %name, error = %err, "read failed; closing connection");
                    break format!("read failed: {err}");
                }
            };

            if msg.is_response() {
                self.invoker.handle_response_message(msg);
                continue;
            }

            if let Err(err) = self.dispatch(msg) {
                warn!(connection = %name, error = %err, "failed sending response");
                break format!("write failed: {err}");
            }
        };

        self.closed.store(true, Ordering::SeqCst);
        let _ = self.reader.get_ref().shutdown_stream();
        self.invoker.clear_msg_writer();
        self.invoker.fail_all(&reason);
        debug!(connection = %name, reason = %reason, "connection stopped");
    }

    fn dispatch(&self, request: MessagePtr) -> std::result::Result<(), FrameError> {
        let Some(dispatcher) = &self.dispatcher else {
            debug!(id = request.id(), method = request.method(), "no dispatcher; dropping request");
            return Ok(());
        };

        let Some(output) = dispatcher(Arc::clone(&request)) else {
            return Ok(());
        };
        if request.id() == UNSET_ID {
            return Ok(());
        }

        let response = Message::response_to(&request, output);
        lock_writer(&self.writer).write_message(&response)
    }
}

fn lock_writer<S>(writer: &SharedWriter<S>) -> MutexGuard<'_, FrameWriter<S>> {
    writer.lock().unwrap_or_else(PoisonError::into_inner)
}

fn msg_writer<S: BusStream>(writer: SharedWriter<S>) -> MsgWriter {
    Arc::new(move |msg: MessagePtr| {
        let mut guard = lock_writer(&writer);
        guard.write_message(&msg).map_err(|err| {
            // Part of the frame may already be on the wire; the stream is
            // no longer usable. Shutting it down stops the I/O thread.
            let _ = guard.get_ref().shutdown_stream();
            RpcError::Unavailable(format!("send failed: {err}"))
        })
    })
}
