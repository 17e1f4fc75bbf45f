//! TCP/TLS transport and the password handshake.
//!
//! [`connect`] opens a fresh socket for every attempt; a broken
//! [`Connection`] is dropped rather than repaired. TLS runs with certificate
//! and hostname validation disabled so that deployments using self-signed
//! server certificates keep working.

use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::{debug, info};
use native_tls::{TlsConnector, TlsStream};

use crate::{config::Session, error::ShipError};

/// Token the server returns when the password digest is accepted.
pub const AUTH_SUCCESS: &str = "AUTH_SUCCESS";

/// Upper bound on the handshake response read.
const AUTH_RESPONSE_LIMIT: usize = 1024;

/// Lifecycle of the session's connection slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticated,
    Failed,
}

/// Underlying byte stream.
enum Stream {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Stream {
    fn tcp(&self) -> &TcpStream {
        match self {
            Stream::PlainTcp(stream) => stream,
            Stream::Tls(stream) => stream.get_ref(),
        }
    }
}

/// One live, authenticated connection to the receiving server.
pub struct Connection {
    stream: Stream,
    peer: String,
}

impl Connection {
    /// `host:port` this connection points at.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Current read timeout of the underlying socket.
    pub fn read_timeout(&self) -> io::Result<Option<Duration>> {
        self.stream.tcp().read_timeout()
    }

    /// Update the read timeout of the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.tcp().set_read_timeout(timeout)
    }

    /// Update the write timeout of the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.tcp().set_write_timeout(timeout)
    }

    /// Close both directions of the socket. Errors are ignored because the
    /// connection is being discarded either way.
    pub fn close(self) {
        let _ = self.stream.tcp().shutdown(Shutdown::Both);
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stream {
            Stream::PlainTcp(stream) => stream.read(buf),
            Stream::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.stream {
            Stream::PlainTcp(stream) => stream.write(buf),
            Stream::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stream {
            Stream::PlainTcp(stream) => stream.flush(),
            Stream::Tls(stream) => stream.flush(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("tls", &matches!(self.stream, Stream::Tls(_)))
            .finish()
    }
}

fn socket_addrs(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    (host, port).to_socket_addrs().map(|iter| iter.collect())
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in socket_addrs(host, port)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nonblocking(false)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{host}:{port} did not resolve to any address"),
        )
    }))
}

fn insecure_connector() -> io::Result<TlsConnector> {
    let mut builder = TlsConnector::builder();
    builder.danger_accept_invalid_certs(true);
    builder.danger_accept_invalid_hostnames(true);
    builder.build().map_err(io::Error::other)
}

fn upgrade_tls(host: &str, stream: TcpStream, timeout: Duration) -> io::Result<Stream> {
    let connector = insecure_connector()?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    let stream = connector.connect(host, stream).map_err(io::Error::other)?;
    Ok(Stream::Tls(Box::new(stream)))
}

/// Send the password digest and check the server's verdict.
///
/// The read is bounded by the socket's current read timeout.
pub fn authenticate(conn: &mut Connection, digest: &str) -> Result<(), ShipError> {
    conn.write_all(digest.as_bytes())?;
    conn.flush()?;
    let mut buf = [0u8; AUTH_RESPONSE_LIMIT];
    let read = conn.read(&mut buf)?;
    let response = String::from_utf8_lossy(&buf[..read]).trim().to_owned();
    if response == AUTH_SUCCESS {
        Ok(())
    } else {
        Err(ShipError::Auth {
            peer: conn.peer.clone(),
            response,
        })
    }
}

/// Open, optionally encrypt, and authenticate a connection for `session`.
///
/// Any failure drops the socket before returning. No retries happen here.
pub fn connect(session: &Session) -> Result<Connection, ShipError> {
    let peer = session.peer();
    debug!("logship: opening connection to {peer}");
    let tcp = connect_tcp(&session.host, session.port, session.connect_timeout)?;
    tcp.set_read_timeout(Some(session.connect_timeout))?;
    tcp.set_write_timeout(Some(session.connect_timeout))?;
    let stream = if session.use_tls {
        upgrade_tls(&session.host, tcp, session.connect_timeout)?
    } else {
        Stream::PlainTcp(tcp)
    };
    let mut conn = Connection { stream, peer };

    if let Some(digest) = &session.password_digest
        && let Err(err) = authenticate(&mut conn, digest)
    {
        conn.close();
        return Err(err);
    }
    info!(
        "logship: connected to {} (tls: {}, authenticated: {})",
        conn.peer,
        session.use_tls,
        session.password_digest.is_some()
    );
    Ok(conn)
}
