use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::connection::{BusConnection, Dispatcher};
use crate::error::ConnectionResult;

/// Accepts TCP connections and starts a [`BusConnection`] for each one.
pub struct BusListener {
    listener: TcpListener,
    config: ConnectionConfig,
    dispatcher: Option<Dispatcher>,
    next_conn_id: AtomicU64,
}

impl BusListener {
    /// Bind to `addr`. Use port 0 to let the OS pick.
    pub fn bind(addr: impl ToSocketAddrs) -> ConnectionResult<Self> {
        let listener = TcpListener::bind(addr)?;
        info!(addr = ?listener.local_addr().ok(), "listening");
        Ok(Self {
            listener,
            config: ConnectionConfig::default(),
            dispatcher: None,
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// Override the configuration used for accepted connections.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle requests arriving on accepted connections.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Block until the next connection arrives.
    pub fn accept(&self) -> ConnectionResult<BusConnection<TcpStream>> {
        let (stream, peer) = self.listener.accept()?;
        self.start(stream, peer)
    }

    /// Accept without blocking; `None` when nothing is waiting.
    ///
    /// Only meaningful after `set_nonblocking(true)`.
    pub fn try_accept(&self) -> ConnectionResult<Option<BusConnection<TcpStream>>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(false)?;
                self.start(stream, peer).map(Some)
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.listener.set_nonblocking(nonblocking)
    }

    fn start(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> ConnectionResult<BusConnection<TcpStream>> {
        stream.set_nodelay(true)?;
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let mut config = self.config.clone();
        config.invoker.name = format!("{}-{id}", config.invoker.name);
        debug!(%peer, connection = %config.invoker.name, "accepted connection");
        BusConnection::start(stream, config, self.dispatcher.clone())
    }
}
