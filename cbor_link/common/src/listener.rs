//! Background UDP receiver.
//!
//! One dedicated thread waits for datagrams, drains everything queued on the
//! socket, and hands each datagram to the consumer as an owned buffer.

use log::{debug, error, info, trace};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::{Endpoint, PipelineStats, SourceError};

/// Size of the scratch buffer and of the requested OS receive buffer.
pub const RECV_BUFFER_SIZE: usize = 1024 * 1024;
/// Longest time the receive thread blocks before re-checking the stop flag.
pub const WAIT_TIME: Duration = Duration::from_millis(100);
pub const MULTICAST_TTL: u32 = 2;

const THREAD_STACK_SIZE: usize = 128 * 1024;

static THREAD_INDEX: AtomicUsize = AtomicUsize::new(0);

/// One received datagram, exclusively owned by whoever holds it.
#[derive(Debug)]
pub struct RawDatagram {
    bytes: Box<[u8]>,
    from: SocketAddr,
}

impl RawDatagram {
    pub fn new(bytes: &[u8], from: SocketAddr) -> Self {
        Self {
            bytes: bytes.into(),
            from,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sender(&self) -> SocketAddr {
        self.from
    }
}

pub struct Listener {
    endpoint: Endpoint,
    socket: Option<Arc<UdpSocket>>,
    thread: Option<JoinHandle<()>>,
    stopping: Arc<AtomicBool>,
}

impl Listener {
    /// Binds `endpoint` and spawns the receive thread. Every datagram goes to
    /// `dispatch`; when that queue is full the datagram is dropped and counted.
    pub fn start(
        endpoint: Endpoint,
        dispatch: SyncSender<RawDatagram>,
        stats: Arc<PipelineStats>,
    ) -> Result<Self, SourceError> {
        let socket = bind_socket(&endpoint).map_err(|source| SourceError::Bind {
            endpoint: endpoint.addr(),
            source,
        })?;
        let socket = Arc::new(socket);
        let stopping = Arc::new(AtomicBool::new(false));

        let receiver = ReceiveLoop {
            socket: socket.clone(),
            stopping: stopping.clone(),
            outbox: dispatch,
            stats,
            scratch: vec![0u8; RECV_BUFFER_SIZE],
        };

        let name = format!(
            "cbor-udp-recv-{}",
            THREAD_INDEX.fetch_add(1, Ordering::Relaxed)
        );
        let thread = thread::Builder::new()
            .name(name)
            .stack_size(THREAD_STACK_SIZE)
            .spawn(move || receiver.run())
            .map_err(SourceError::Spawn)?;

        match socket.local_addr() {
            Ok(local) => info!("Listening for CBOR frames on {}", local),
            Err(_) => info!("Listening for CBOR frames on {}", endpoint),
        }

        Ok(Self {
            endpoint,
            socket: Some(socket),
            thread: Some(thread),
            stopping,
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Address actually bound, useful when the endpoint asked for port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Asks the receive thread to exit. Does not wait for it.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    /// Stops the receive thread, waits for it to exit, then closes the socket.
    pub fn shutdown(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("CBOR receive thread for {} panicked", self.endpoint);
            }
        }
        self.socket = None;
    }

    /// True while the listener is receiving: not stopping, with a live thread and socket.
    pub fn is_valid(&self) -> bool {
        !self.stopping.load(Ordering::Acquire) && self.thread.is_some() && self.socket.is_some()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct ReceiveLoop {
    socket: Arc<UdpSocket>,
    stopping: Arc<AtomicBool>,
    outbox: SyncSender<RawDatagram>,
    stats: Arc<PipelineStats>,
    scratch: Vec<u8>,
}

impl ReceiveLoop {
    fn run(mut self) {
        debug!("CBOR receive thread started");

        while !self.stopping.load(Ordering::Acquire) {
            // Blocks for at most WAIT_TIME (socket read timeout).
            match self.socket.recv_from(&mut self.scratch) {
                Ok((len, from)) => {
                    self.dispatch(len, from);
                    self.drain();
                }
                Err(ref e) if is_timeout(e) => {}
                Err(e) => {
                    self.stats.record_receive_error();
                    debug!("UDP receive error: {}", e);
                }
            }
        }

        debug!("CBOR receive thread exiting");
    }

    /// Receives everything already queued on the socket without blocking.
    fn drain(&mut self) {
        if let Err(e) = self.socket.set_nonblocking(true) {
            debug!("Failed to switch socket to non-blocking: {}", e);
            return;
        }

        while !self.stopping.load(Ordering::Acquire) {
            match self.socket.recv_from(&mut self.scratch) {
                Ok((len, from)) => self.dispatch(len, from),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.stats.record_receive_error();
                    debug!("UDP receive error: {}", e);
                    break;
                }
            }
        }

        restore_blocking(self.socket.set_nonblocking(false), &self.stopping);
    }

    fn dispatch(&self, len: usize, from: SocketAddr) {
        if len == 0 {
            self.stats.record_empty();
            return;
        }
        self.stats.record_received();

        let datagram = RawDatagram::new(&self.scratch[..len], from);
        match self.outbox.try_send(datagram) {
            Ok(()) => trace!("Queued {} byte datagram from {}", len, from),
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.stats.record_dropped();
            }
        }
    }
}

/// The bounded wait needs a blocking socket. If the mode cannot be restored
/// the receive loop stops rather than spinning on `WouldBlock`.
fn restore_blocking(result: io::Result<()>, stopping: &AtomicBool) {
    if let Err(e) = result {
        error!("Failed to restore blocking socket mode, stopping receiver: {}", e);
        stopping.store(true, Ordering::Release);
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn bind_socket(endpoint: &Endpoint) -> io::Result<UdpSocket> {
    let addr = endpoint.addr();
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    // Some platforms cap the receive buffer; a smaller one still works.
    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        debug!("Could not raise UDP receive buffer to {}: {}", RECV_BUFFER_SIZE, e);
    }

    match addr.ip() {
        IpAddr::V4(group) if group.is_multicast() => {
            let any = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, addr.port());
            socket.bind(&SockAddr::from(any))?;
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
            socket.set_multicast_loop_v4(true)?;
            socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
            info!("Joined multicast group {}", group);
        }
        IpAddr::V6(group) if group.is_multicast() => {
            let any = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, addr.port(), 0, 0);
            socket.bind(&SockAddr::from(any))?;
            socket.join_multicast_v6(&group, 0)?;
            socket.set_multicast_loop_v6(true)?;
            socket.set_multicast_hops_v6(MULTICAST_TTL)?;
            info!("Joined multicast group {}", group);
        }
        _ => socket.bind(&SockAddr::from(addr))?,
    }

    socket.set_read_timeout(Some(WAIT_TIME))?;
    Ok(socket.into())
}
