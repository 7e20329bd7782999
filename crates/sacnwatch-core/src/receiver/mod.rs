//! Live E1.31 receiver.
//!
//! One UDP socket bound to `0.0.0.0:<port>` receives unicast, broadcast and
//! (after group joins) multicast datagrams. A dedicated thread performs
//! blocking reads with a short timeout, decodes each datagram and offers it
//! to a bounded queue. When the queue is full the newest packet is dropped;
//! the read loop never waits on consumers. Malformed datagrams are dropped
//! without logging.

mod error;
mod multicast;

pub use error::ReceiverError;
pub use multicast::{multicast_group, multicast_interfaces};

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver as QueueReceiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use crate::protocols::sacn::{SACN_PORT, parse_sacn_packet};
use crate::source::ReceivedPacket;

/// Universes whose multicast groups are joined by default.
pub const DEFAULT_JOIN_UNIVERSES: RangeInclusive<u16> = 1..=63;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1500;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Receiver settings. `port: 0` binds an ephemeral port (useful in tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    pub port: u16,
    pub join_universes: RangeInclusive<u16>,
    pub queue_capacity: usize,
    pub max_datagram_size: usize,
    /// Upper bound on how long shutdown waits for a blocked read.
    pub read_timeout: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: SACN_PORT,
            join_universes: DEFAULT_JOIN_UNIVERSES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

enum State {
    Idle(Sender<ReceivedPacket>),
    Running {
        handle: JoinHandle<()>,
        local_addr: SocketAddr,
    },
    Stopped,
}

/// Network receiver feeding a bounded, lossy packet queue.
///
/// The queue closes once the receiver stops, so consumers iterating over
/// [`packets`](Self::packets) finish after draining what was already queued.
///
/// # Examples
/// ```no_run
/// use sacnwatch_core::{Receiver, ReceiverConfig};
///
/// let receiver = Receiver::new(ReceiverConfig::default());
/// receiver.start()?;
/// for packet in receiver.packets().iter().take(10) {
///     println!("universe {} seq {}", packet.packet.universe, packet.packet.sequence);
/// }
/// receiver.stop();
/// # Ok::<(), sacnwatch_core::ReceiverError>(())
/// ```
pub struct Receiver {
    config: ReceiverConfig,
    queue: QueueReceiver<ReceivedPacket>,
    state: Mutex<State>,
    shutdown: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Self {
        let (sender, queue) = bounded(config.queue_capacity.max(1));
        Self {
            config,
            queue,
            state: Mutex::new(State::Idle(sender)),
            shutdown: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Bind the socket, join multicast groups and spawn the read loop.
    ///
    /// Fails with [`ReceiverError::AlreadyStarted`] on any call after the
    /// first successful one, including after [`stop`](Self::stop). A failed
    /// start leaves the receiver idle, so it can be retried.
    pub fn start(&self) -> Result<SocketAddr, ReceiverError> {
        let mut state = self.state.lock();
        let State::Idle(sender) = &*state else {
            return Err(ReceiverError::AlreadyStarted);
        };
        let sender = sender.clone();

        let socket = open_socket(&self.config)?;
        let local_addr = socket.local_addr()?;
        multicast::join_groups(&socket, self.config.join_universes.clone());

        let shutdown = Arc::clone(&self.shutdown);
        let dropped = Arc::clone(&self.dropped);
        let max_datagram_size = self.config.max_datagram_size;
        let handle = thread::Builder::new()
            .name("sacn-recv".to_string())
            .spawn(move || read_loop(socket, sender, &shutdown, &dropped, max_datagram_size))
            .map_err(ReceiverError::Spawn)?;

        info!(%local_addr, "sACN receiver started");
        // replacing Idle drops the last sender outside the read thread
        *state = State::Running { handle, local_addr };
        Ok(local_addr)
    }

    /// Signal the read loop, wait for it to exit and release the socket.
    ///
    /// The socket is not closed under the blocked read: the loop checks the
    /// shutdown flag each time a read returns or times out, so this returns
    /// within roughly one [`ReceiverConfig::read_timeout`]. The queue closes
    /// once the loop exits. Safe to call repeatedly.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        let previous = std::mem::replace(&mut *self.state.lock(), State::Stopped);
        if let State::Running { handle, .. } = previous {
            if handle.join().is_err() {
                warn!("sACN receive thread panicked");
            }
        }
    }

    /// Consumer side of the decoded-packet queue.
    pub fn packets(&self) -> QueueReceiver<ReceivedPacket> {
        self.queue.clone()
    }

    /// Packets discarded because the queue was full.
    pub fn dropped_packets(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock() {
            State::Running { local_addr, .. } => Some(*local_addr),
            State::Idle(_) | State::Stopped => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.state.lock(), State::Running { .. })
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_socket(config: &ReceiverConfig) -> Result<UdpSocket, ReceiverError> {
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket
        .bind(&SocketAddr::V4(addr).into())
        .map_err(|source| ReceiverError::Bind {
            addr: SocketAddr::V4(addr),
            source,
        })?;
    // a zero timeout would mean "block forever" and defeat shutdown
    socket.set_read_timeout(Some(config.read_timeout.max(Duration::from_millis(1))))?;
    Ok(socket.into())
}

fn read_loop(
    socket: UdpSocket,
    sender: Sender<ReceivedPacket>,
    shutdown: &AtomicBool,
    dropped: &AtomicU64,
    max_datagram_size: usize,
) {
    let mut buf = vec![0u8; max_datagram_size];
    while !shutdown.load(Ordering::Acquire) {
        let (len, source_addr) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(err) => {
                if !shutdown.load(Ordering::Acquire) {
                    debug!(error = %err, "sACN receive failed");
                }
                continue;
            }
        };
        let received_at = Instant::now();

        let Ok(packet) = parse_sacn_packet(&buf[..len]) else {
            continue;
        };
        let received = ReceivedPacket {
            packet,
            received_at,
            source_addr,
        };
        match sender.try_send(received) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
    info!("sACN receiver stopped");
}
