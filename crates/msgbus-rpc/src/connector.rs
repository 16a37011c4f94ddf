use std::net::{TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::config::ConnectionConfig;
use crate::connection::{BusConnection, Dispatcher};
use crate::error::ConnectionResult;

/// Connect to a bus endpoint over TCP with default settings.
pub fn connect(addr: impl ToSocketAddrs) -> ConnectionResult<BusConnection<TcpStream>> {
    connect_with_config(addr, ConnectionConfig::default(), None)
}

/// Connect with explicit configuration and an optional handler for requests
/// sent by the remote side.
pub fn connect_with_config(
    addr: impl ToSocketAddrs,
    config: ConnectionConfig,
    dispatcher: Option<Dispatcher>,
) -> ConnectionResult<BusConnection<TcpStream>> {
    let stream = TcpStream::connect(addr)?;
    stream.set_nodelay(true)?;
    debug!(peer = ?stream.peer_addr().ok(), "connected");
    BusConnection::start(stream, config, dispatcher)
}

/// Connect to a bus endpoint on a Unix domain socket.
#[cfg(unix)]
pub fn connect_unix(
    path: impl AsRef<std::path::Path>,
    config: ConnectionConfig,
    dispatcher: Option<Dispatcher>,
) -> ConnectionResult<BusConnection<std::os::unix::net::UnixStream>> {
    let path = path.as_ref();
    let stream = std::os::unix::net::UnixStream::connect(path)?;
    debug!(?path, "connected");
    BusConnection::start(stream, config, dispatcher)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;
    use crate::error::ConnectionError;

    #[test]
    fn connect_refused_is_io_error() {
        // Bind then drop to get a port nobody is listening on.
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();

        let ConnectionError::Io(err) = connect(addr).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
    }

    #[cfg(unix)]
    #[test]
    fn connect_unix_reaches_listener() {
        use std::os::unix::net::UnixListener;
        use std::sync::Arc;

        use msgbus_frame::{MessagePtr, Payload};

        let dir = std::env::temp_dir().join(format!(
            "msgbus-connect-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let sock_path = dir.join("bus.sock");
        let listener = UnixListener::bind(&sock_path).expect("listener should bind");

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("listener should accept");
            let dispatcher: Dispatcher =
                Arc::new(|request: MessagePtr| Some(request.data().clone()));
            let mut conn =
                BusConnection::start(stream, ConnectionConfig::default(), Some(dispatcher))
                    .expect("server connection should start");
            conn.wait();
        });

        let mut input = Payload::new();
        input.insert("ping".to_string(), "1".to_string());
        {
            let client = connect_unix(&sock_path, ConnectionConfig::default(), None)
                .expect("client should connect");
            assert_eq!(client.call("echo", input.clone()).unwrap(), input);
        }

        server.join().expect("server thread should finish");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
