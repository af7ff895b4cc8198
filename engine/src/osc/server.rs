//! The OSC server: one socket, one dedicated receive thread, running its
//! own traffic on a `std::thread::JoinHandle` against a blocking
//! `UdpSocket` with a short read timeout so the loop can notice a shutdown
//! flag, plus a TCP transport with 4-byte length-prefix framing.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, warn};

use crate::error::{EngineError, EngineResult};
use crate::osc::codec::{self, OscPacket, DEFAULT_MAX_PACKET_SIZE};
use crate::osc::dispatcher::Dispatcher;
use crate::osc::value::Value;

const RECV_POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

enum Outgoing {
    Udp(UdpSocket, std::net::SocketAddr),
    Tcp(Mutex<TcpStream>),
}

/// Reads `OSC_MAX_MESSAGE_SIZE` once, falling back to the 64 KiB default.
pub fn configured_max_packet_size() -> usize {
    std::env::var("OSC_MAX_MESSAGE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_PACKET_SIZE)
}

/// A running OSC server: the dispatcher it routes into, a handle for
/// sending replies/queries back out, and the receive thread's join handle.
pub struct Server {
    dispatcher: Arc<Mutex<Dispatcher>>,
    outgoing: Arc<Outgoing>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    max_packet_size: usize,
}

impl Server {
    pub fn bind_udp(host: &str, port: u16, remote: std::net::SocketAddr) -> EngineResult<Self> {
        let socket = UdpSocket::bind((host, port))
            .map_err(|e| EngineError::ConfigError(format!("failed to bind UDP {host}:{port}: {e}")))?;
        socket
            .set_read_timeout(Some(RECV_POLL_TIMEOUT))
            .map_err(|e| EngineError::ConfigError(e.to_string()))?;
        let recv_socket = socket
            .try_clone()
            .map_err(|e| EngineError::ConfigError(e.to_string()))?;
        let dispatcher = Arc::new(Mutex::new(Dispatcher::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let max_packet_size = configured_max_packet_size();

        let thread_dispatcher = dispatcher.clone();
        let thread_shutdown = shutdown.clone();
        let thread = thread::spawn(move || {
            udp_receive_loop(recv_socket, thread_dispatcher, thread_shutdown, max_packet_size)
        });

        Ok(Self {
            dispatcher,
            outgoing: Arc::new(Outgoing::Udp(socket, remote)),
            shutdown,
            thread: Some(thread),
            max_packet_size,
        })
    }

    pub fn connect_tcp(host: &str, port: u16) -> EngineResult<Self> {
        let stream = TcpStream::connect((host, port))
            .map_err(|e| EngineError::ConfigError(format!("failed to connect TCP {host}:{port}: {e}")))?;
        stream
            .set_read_timeout(Some(RECV_POLL_TIMEOUT))
            .map_err(|e| EngineError::ConfigError(e.to_string()))?;
        let recv_stream = stream
            .try_clone()
            .map_err(|e| EngineError::ConfigError(e.to_string()))?;
        let dispatcher = Arc::new(Mutex::new(Dispatcher::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let max_packet_size = configured_max_packet_size();

        let thread_dispatcher = dispatcher.clone();
        let thread_shutdown = shutdown.clone();
        let thread = thread::spawn(move || {
            tcp_receive_loop(recv_stream, thread_dispatcher, thread_shutdown, max_packet_size)
        });

        Ok(Self {
            dispatcher,
            outgoing: Arc::new(Outgoing::Tcp(Mutex::new(stream))),
            shutdown,
            thread: Some(thread),
            max_packet_size,
        })
    }

    pub fn dispatcher(&self) -> Arc<Mutex<Dispatcher>> {
        self.dispatcher.clone()
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    pub fn send_packet(&self, packet: &OscPacket) -> EngineResult<()> {
        let bytes = codec::encode_packet(packet);
        match self.outgoing.as_ref() {
            Outgoing::Udp(socket, remote) => {
                socket
                    .send_to(&bytes, remote)
                    .map_err(|e| EngineError::OscSendError(e.to_string()))?;
            }
            Outgoing::Tcp(stream) => {
                let mut stream = stream.lock().unwrap();
                let mut framed = Vec::with_capacity(bytes.len() + 4);
                framed.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                framed.extend_from_slice(&bytes);
                stream
                    .write_all(&framed)
                    .map_err(|e| EngineError::OscSendError(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Registers a one-shot method on `address`, sends an empty-argument
    /// message to it (the device-specific "read" convention), and waits
    /// for the reply up to `timeout`.
    ///
    /// Concurrent queries to the same address are serialized by the
    /// caller holding this `Server` behind a lock.
    pub async fn query(&self, address: &str, timeout: Duration) -> EngineResult<Value> {
        use crate::osc::codec::OscMessage;

        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let method_id = {
            let mut dispatcher = self.dispatcher.lock().unwrap();
            let tx = tx.clone();
            dispatcher.add_method(
                address,
                "",
                Box::new(move |msg| {
                    if let Some(tx) = tx.lock().unwrap().take() {
                        let value = msg.args.first().and_then(|v| v.as_f64());
                        let _ = tx.send(value);
                    }
                }),
            )
        };

        self.send_packet(&OscPacket::Message(OscMessage::new(address, vec![])))?;

        let result = tokio::time::timeout(timeout, rx).await;
        self.dispatcher.lock().unwrap().remove_method(method_id);

        match result {
            Ok(Ok(Some(v))) => Ok(Value::Float64(v)),
            Ok(Ok(None)) => Err(EngineError::OscDecodeError(
                "query reply carried no numeric argument".into(),
            )),
            Ok(Err(_)) | Err(_) => Err(EngineError::QueryTimeout),
        }
    }

    /// Sets the shutdown flag; the receive loop notices within
    /// `RECV_POLL_TIMEOUT` and exits. `join()` completes the handshake.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Joins the receive thread after closing the socket and interrupting
    /// the blocked recv call.
    pub fn join(&mut self, timeout: Duration) -> EngineResult<()> {
        self.stop();
        if let Some(handle) = self.thread.take() {
            let (done_tx, done_rx) = std::sync::mpsc::channel();
            let wrapper = thread::spawn(move || {
                let _ = handle.join();
                let _ = done_tx.send(());
            });
            if done_rx.recv_timeout(timeout).is_err() {
                warn!("OSC server thread did not join within timeout");
                return Err(EngineError::ConfigError(
                    "OSC server thread join timed out".into(),
                ));
            }
            let _ = wrapper.join();
        }
        Ok(())
    }
}

fn udp_receive_loop(
    socket: UdpSocket,
    dispatcher: Arc<Mutex<Dispatcher>>,
    shutdown: Arc<AtomicBool>,
    max_packet_size: usize,
) {
    let mut buf = vec![0u8; max_packet_size];
    while !shutdown.load(Ordering::Acquire) {
        match socket.recv(&mut buf) {
            Ok(n) => match codec::decode_packet(&buf[..n]) {
                Ok(packet) => dispatcher.lock().unwrap().dispatch_packet(&packet),
                Err(e) => warn!(error = %e, "dropping malformed OSC packet"),
            },
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                error!(error = %e, "OSC UDP socket error, continuing");
            }
        }
    }
}

fn tcp_receive_loop(
    mut stream: TcpStream,
    dispatcher: Arc<Mutex<Dispatcher>>,
    shutdown: Arc<AtomicBool>,
    max_packet_size: usize,
) {
    while !shutdown.load(Ordering::Acquire) {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue
            }
            Err(_) => break,
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > max_packet_size {
            error!(len, max_packet_size, "TCP frame exceeds max packet size, closing stream");
            break;
        }
        let mut payload = vec![0u8; len];
        if stream.read_exact(&mut payload).is_err() {
            break;
        }
        match codec::decode_packet(&payload) {
            Ok(packet) => dispatcher.lock().unwrap().dispatch_packet(&packet),
            Err(e) => warn!(error = %e, "dropping malformed OSC TCP frame"),
        }
    }
}

/// Accepts TCP connections on a dedicated thread, spawning a receive loop
/// per accepted connection (each sharing the same dispatcher) — used for
/// the server-listens variant of the TCP transport.
pub fn spawn_tcp_listener(
    listener: TcpListener,
    dispatcher: Arc<Mutex<Dispatcher>>,
    shutdown: Arc<AtomicBool>,
    max_packet_size: usize,
) -> JoinHandle<()> {
    listener
        .set_nonblocking(true)
        .expect("TCP listener must support nonblocking mode");
    thread::spawn(move || {
        while !shutdown.load(Ordering::Acquire) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    let _ = stream.set_read_timeout(Some(RECV_POLL_TIMEOUT));
                    let dispatcher = dispatcher.clone();
                    let shutdown = shutdown.clone();
                    thread::spawn(move || tcp_receive_loop(stream, dispatcher, shutdown, max_packet_size));
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(RECV_POLL_TIMEOUT);
                }
                Err(e) => {
                    error!(error = %e, "TCP accept error, continuing");
                }
            }
        }
    })
}
