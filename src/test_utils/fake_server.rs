//! Scripted stand-in for the receiving server.

use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

/// How the server answers each chunk of line data.
#[derive(Clone, Copy, Debug)]
pub enum Reply {
    /// Echo the bytes back verbatim.
    Echo,
    /// Answer with fixed bytes regardless of input.
    Fixed(&'static str),
    /// Drop the connection without answering.
    Close,
    /// Never answer; keep the connection open.
    Silent,
}

/// What the server observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Seen {
    /// Raw handshake bytes.
    Auth(String),
    /// One newline-terminated line, without the newline.
    Line(String),
}

/// Handle to a running fake server.
pub struct FakeServer {
    pub addr: SocketAddr,
    pub seen: mpsc::Receiver<Seen>,
    connections: Arc<AtomicUsize>,
}

impl FakeServer {
    /// Number of TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Wait for the next observation.
    pub fn next(&self) -> Seen {
        self.seen
            .recv_timeout(Duration::from_secs(5))
            .expect("server observation")
    }

    /// Wait for the next observed line, skipping handshakes.
    pub fn next_line(&self) -> String {
        loop {
            if let Seen::Line(line) = self.next() {
                return line;
            }
        }
    }
}

/// Start a server on an ephemeral port.
///
/// With `auth` set, the server reads the 64-byte digest of every connection
/// and answers with `auth`; connections are closed unless it answered
/// `AUTH_SUCCESS`.
pub fn spawn(auth: Option<&'static str>, reply: Reply) -> FakeServer {
    spawn_on(SocketAddr::from(([127, 0, 0, 1], 0)), auth, reply)
}

/// Start a server on `addr`.
pub fn spawn_on(addr: SocketAddr, auth: Option<&'static str>, reply: Reply) -> FakeServer {
    let listener = TcpListener::bind(addr).expect("bind listener");
    let addr = listener.local_addr().expect("listener has address");
    let (tx, seen) = mpsc::channel();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            counter.fetch_add(1, Ordering::SeqCst);
            let tx = tx.clone();
            thread::spawn(move || serve(stream, auth, reply, tx));
        }
    });
    FakeServer {
        addr,
        seen,
        connections,
    }
}

fn serve(mut stream: TcpStream, auth: Option<&'static str>, reply: Reply, tx: mpsc::Sender<Seen>) {
    if let Some(answer) = auth {
        let mut digest = [0u8; 64];
        if stream.read_exact(&mut digest).is_err() {
            return;
        }
        let _ = tx.send(Seen::Auth(String::from_utf8_lossy(&digest).into_owned()));
        let _ = stream.write_all(answer.as_bytes());
        if answer != "AUTH_SUCCESS" {
            return;
        }
    }
    let mut buf = [0u8; 8192];
    loop {
        let read = match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let chunk = &buf[..read];
        for line in String::from_utf8_lossy(chunk).split('\n') {
            if !line.is_empty() {
                let _ = tx.send(Seen::Line(line.to_owned()));
            }
        }
        match reply {
            Reply::Echo => {
                if stream.write_all(chunk).is_err() {
                    return;
                }
            }
            Reply::Fixed(answer) => {
                if stream.write_all(answer.as_bytes()).is_err() {
                    return;
                }
            }
            Reply::Close => return,
            Reply::Silent => {}
        }
    }
}
