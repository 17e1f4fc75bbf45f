//! A line-echoing collector that can be taken down and brought back on the
//! same port.

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use logship::config::password_digest;

pub struct Collector {
    pub addr: SocketAddr,
    lines: Receiver<String>,
    tx: Sender<String>,
    password: Option<&'static str>,
    connections: Arc<AtomicUsize>,
    running: Option<Running>,
}

struct Running {
    shutdown: Arc<AtomicBool>,
    streams: Arc<Mutex<Vec<TcpStream>>>,
    accept: JoinHandle<()>,
}

impl Collector {
    /// Start on an ephemeral port, requiring `password` when set.
    pub fn start(password: Option<&'static str>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind collector");
        let addr = listener.local_addr().expect("collector address");
        let (tx, lines) = unbounded();
        let mut collector = Self {
            addr,
            lines,
            tx,
            password,
            connections: Arc::new(AtomicUsize::new(0)),
            running: None,
        };
        collector.serve(listener);
        collector
    }

    /// Connections accepted over the collector's lifetime.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next line received, without its newline.
    pub fn next_line(&self) -> String {
        self.lines
            .recv_timeout(Duration::from_secs(10))
            .expect("collector received a line")
    }

    /// Stop listening and drop every open connection.
    pub fn kill(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.shutdown.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
        let _ = running.accept.join();
        for stream in running.streams.lock().expect("streams lock").drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Listen again on the original port.
    pub fn restart(&mut self) {
        let listener = TcpListener::bind(self.addr).expect("rebind collector");
        self.serve(listener);
    }

    fn serve(&mut self, listener: TcpListener) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let streams = Arc::new(Mutex::new(Vec::new()));
        let accept = {
            let shutdown = Arc::clone(&shutdown);
            let streams = Arc::clone(&streams);
            let connections = Arc::clone(&self.connections);
            let tx = self.tx.clone();
            let expected = self.password.map(password_digest);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    connections.fetch_add(1, Ordering::SeqCst);
                    if let Ok(clone) = stream.try_clone() {
                        streams.lock().expect("streams lock").push(clone);
                    }
                    let tx = tx.clone();
                    let expected = expected.clone();
                    thread::spawn(move || echo(stream, expected, tx));
                }
            })
        };
        self.running = Some(Running {
            shutdown,
            streams,
            accept,
        });
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.kill();
    }
}

fn echo(mut stream: TcpStream, expected: Option<String>, tx: Sender<String>) {
    if let Some(expected) = expected {
        let mut digest = [0u8; 64];
        if stream.read_exact(&mut digest).is_err() {
            return;
        }
        let ok = digest == expected.as_bytes();
        let reply: &[u8] = if ok { b"AUTH_SUCCESS" } else { b"AUTH_FAILED" };
        if stream.write_all(reply).is_err() || !ok {
            return;
        }
    }
    let Ok(reader) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        if stream.write_all(line.as_bytes()).is_err() {
            return;
        }
        let _ = tx.send(line.trim_end_matches('\n').to_owned());
    }
}
