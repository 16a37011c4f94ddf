use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// A connected byte stream a [`BusConnection`](crate::BusConnection) can run on.
///
/// The connection needs independent handles for its reader thread, its
/// writer and for shutting the socket down from the outside.
pub trait BusStream: Read + Write + Send + Sized + 'static {
    /// Create another handle to the same underlying socket.
    fn try_clone_stream(&self) -> io::Result<Self>;

    /// Shut down both directions, unblocking any pending read.
    fn shutdown_stream(&self) -> io::Result<()>;

    /// Bound how long a single read may block.
    fn set_stream_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Bound how long a single write may block.
    fn set_stream_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl BusStream for TcpStream {
    fn try_clone_stream(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn shutdown_stream(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }

    fn set_stream_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)
    }

    fn set_stream_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_write_timeout(timeout)
    }
}

#[cfg(unix)]
impl BusStream for std::os::unix::net::UnixStream {
    fn try_clone_stream(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn shutdown_stream(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }

    fn set_stream_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)
    }

    fn set_stream_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_write_timeout(timeout)
    }
}
