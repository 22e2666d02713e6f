//! One Art-Net listener: a UDP socket and the thread draining it
//!
//! Each worker owns its socket and the routing table for its universe space.
//! Decoded DMX payloads are written straight into the shared [`VoxelBuffer`].

use std::collections::HashSet;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, error, info, trace, warn};
use voxmap_core::{ListenerRoutes, VoxelBuffer};

use crate::dmx::{decode, ArtNetMessage};
use crate::error::{ControlError, Result};

/// Fixed receive buffer; larger datagrams are truncated or dropped
pub const RECV_BUFFER_SIZE: usize = 1024;

/// How long a blocked receive waits before re-checking the running flag
pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Windows reports a datagram larger than the receive buffer as an error
/// instead of truncating it.
const WSAEMSGSIZE: i32 = 10040;

/// Where a listener reads datagrams from. Implementations should return
/// `WouldBlock` or `TimedOut` periodically so shutdown is observed.
pub trait DatagramSource: Send + 'static {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

impl DatagramSource for UdpSocket {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        UdpSocket::recv(self, buf)
    }
}

fn is_oversized(e: &io::Error) -> bool {
    cfg!(windows) && e.raw_os_error() == Some(WSAEMSGSIZE)
}

/// Lifecycle of a listener worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Socket bound, thread not yet receiving
    Bound,
    /// Receive loop running
    Receiving,
    /// Loop exited after shutdown was requested
    Closed,
    /// Loop ended on a socket error; other listeners keep running
    Failed,
}

impl WorkerState {
    pub fn is_running(&self) -> bool {
        matches!(self, WorkerState::Bound | WorkerState::Receiving)
    }
}

/// Per-listener counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Datagrams received
    pub packets: u64,
    /// ArtDmx packets decoded
    pub dmx_packets: u64,
    /// Datagrams failing the header check
    pub malformed: u64,
    /// DMX packets for universes not in the routing table
    pub unroutable: u64,
    /// ArtSync packets
    pub sync_packets: u64,
    /// Datagrams dropped for exceeding the receive buffer
    pub oversized: u64,
    /// Voxels written into the buffer
    pub pixels_written: u64,
}

/// Receive-side packet handling, independent of the socket
struct PacketHandler {
    routes: ListenerRoutes,
    buffer: Arc<VoxelBuffer>,
    stats: Arc<RwLock<ListenerStats>>,
    warned_universes: HashSet<u16>,
}

impl PacketHandler {
    fn handle(&mut self, bytes: &[u8]) {
        let message = match decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                trace!("{}: dropping datagram: {}", self.routes.addr, e);
                let mut stats = self.stats.write();
                stats.packets += 1;
                stats.malformed += 1;
                return;
            }
        };

        let dmx = match message {
            ArtNetMessage::Dmx(dmx) => dmx,
            other => {
                let mut stats = self.stats.write();
                stats.packets += 1;
                if other.is_sync() {
                    stats.sync_packets += 1;
                    drop(stats);
                    self.buffer.signal();
                }
                return;
            }
        };

        let Some(entry) = self.routes.lookup(dmx.universe) else {
            if self.warned_universes.insert(dmx.universe) {
                warn!(
                    "{}: universe {} is not mapped to any z-slice, dropping its packets",
                    self.routes.addr, dmx.universe
                );
            }
            let mut stats = self.stats.write();
            stats.packets += 1;
            stats.dmx_packets += 1;
            stats.unroutable += 1;
            return;
        };

        if dmx.is_truncated() {
            debug!(
                "{}: universe {} declares {} channels but carries {}",
                self.routes.addr,
                dmx.universe,
                dmx.declared_length,
                dmx.data.len()
            );
        }

        let written = self
            .buffer
            .write_dmx(entry.pixel_buffer_offset, dmx.data, entry.pixel_count);

        let mut stats = self.stats.write();
        stats.packets += 1;
        stats.dmx_packets += 1;
        stats.pixels_written += written as u64;
    }
}

/// A bound listener and its receive thread
pub struct ListenerWorker {
    addr: SocketAddr,
    local_addr: SocketAddr,
    state: Arc<RwLock<WorkerState>>,
    stats: Arc<RwLock<ListenerStats>>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerWorker {
    /// Bind the listener socket and start its receive thread.
    ///
    /// The thread runs until `running` is cleared or the socket fails.
    pub fn spawn(
        routes: ListenerRoutes,
        buffer: Arc<VoxelBuffer>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let addr = routes.addr;
        let socket =
            UdpSocket::bind(addr).map_err(|source| ControlError::BindError { addr, source })?;
        // Blocking receives wake up periodically so the running flag is observed
        socket.set_read_timeout(Some(SHUTDOWN_POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;

        info!(
            "Art-Net listener bound to {} (cube {}, {} universes)",
            local_addr,
            routes.cube_index,
            routes.len()
        );

        Self::from_source(routes, socket, local_addr, buffer, running)
    }

    /// Start a receive thread draining `source` instead of a bound socket.
    pub fn from_source<S: DatagramSource>(
        routes: ListenerRoutes,
        source: S,
        local_addr: SocketAddr,
        buffer: Arc<VoxelBuffer>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let addr = routes.addr;
        let state = Arc::new(RwLock::new(WorkerState::Bound));
        let stats = Arc::new(RwLock::new(ListenerStats::default()));

        let handler = PacketHandler {
            routes,
            buffer,
            stats: stats.clone(),
            warned_universes: HashSet::new(),
        };
        let thread_state = state.clone();

        let thread = thread::Builder::new()
            .name(format!("artnet-{}", local_addr.port()))
            .spawn(move || receive_loop(source, handler, running, thread_state))
            .map_err(|source| ControlError::SpawnError { addr, source })?;

        Ok(Self {
            addr,
            local_addr,
            state,
            stats,
            thread: Some(thread),
        })
    }

    /// Configured address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Address actually bound (differs from `addr` when port 0 was configured)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn stats(&self) -> ListenerStats {
        *self.stats.read()
    }

    /// Wait for the receive thread to exit. The running flag must already be cleared.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Art-Net listener thread for {} panicked", self.addr);
                *self.state.write() = WorkerState::Failed;
            }
        }
    }
}

fn receive_loop<S: DatagramSource>(
    source: S,
    mut handler: PacketHandler,
    running: Arc<AtomicBool>,
    state: Arc<RwLock<WorkerState>>,
) {
    let addr = handler.routes.addr;
    let mut buffer = [0u8; RECV_BUFFER_SIZE];
    *state.write() = WorkerState::Receiving;
    debug!("Art-Net listener {} receiving", addr);

    while running.load(Ordering::Relaxed) {
        let len = match source.recv(&mut buffer) {
            Ok(len) => len,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(e) if is_oversized(&e) => {
                debug!("Art-Net listener {} dropped an oversized datagram", addr);
                let mut stats = handler.stats.write();
                stats.packets += 1;
                stats.oversized += 1;
                continue;
            }
            Err(e) => {
                error!("Art-Net listener {} receive error: {}", addr, e);
                *state.write() = WorkerState::Failed;
                return;
            }
        };

        handler.handle(&buffer[..len]);
    }

    *state.write() = WorkerState::Closed;
    info!("Art-Net listener {} stopped", addr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmx::{encode_dmx, encode_sync};
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};
    use std::time::Instant;
    use voxmap_core::{RouteEntry, VoxelColor};

    enum Step {
        Datagram(Vec<u8>),
        Fail(io::Error),
    }

    /// Replays a fixed sequence of receive results, then idles
    struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
            }
        }
    }

    impl DatagramSource for ScriptedSource {
        fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.lock().pop_front() {
                Some(Step::Datagram(bytes)) => {
                    let len = bytes.len().min(buf.len());
                    buf[..len].copy_from_slice(&bytes[..len]);
                    Ok(len)
                }
                Some(Step::Fail(e)) => Err(e),
                None => {
                    thread::sleep(Duration::from_millis(5));
                    Err(ErrorKind::WouldBlock.into())
                }
            }
        }
    }

    fn routes() -> ListenerRoutes {
        let mut routes = HashMap::new();
        routes.insert(
            0,
            RouteEntry {
                cube_index: 0,
                layer_in_listener: 0,
                z_slice: 0,
                pixel_buffer_offset: 10,
                pixel_count: 2,
            },
        );
        ListenerRoutes::new(0, "127.0.0.1:0".parse().unwrap(), routes)
    }

    fn wait_for_state(worker: &ListenerWorker, state: WorkerState) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if worker.state() == state {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        worker.state() == state
    }

    fn handler(buffer: Arc<VoxelBuffer>) -> PacketHandler {
        PacketHandler {
            routes: routes(),
            buffer,
            stats: Arc::new(RwLock::new(ListenerStats::default())),
            warned_universes: HashSet::new(),
        }
    }

    #[test]
    fn test_dmx_lands_at_route_offset() {
        let buffer = Arc::new(VoxelBuffer::new(20));
        let mut handler = handler(buffer.clone());

        handler.handle(&encode_dmx(0, 1, &[255, 0, 0, 0, 255, 0]));

        assert_eq!(buffer.get(10), Some(VoxelColor::new(255, 0, 0)));
        assert_eq!(buffer.get(11), Some(VoxelColor::new(0, 255, 0)));
        assert_eq!(handler.stats.read().pixels_written, 2);
    }

    #[test]
    fn test_pixels_beyond_route_capacity_are_skipped() {
        let buffer = Arc::new(VoxelBuffer::new(20));
        let mut handler = handler(buffer.clone());

        handler.handle(&encode_dmx(0, 1, &[9; 9]));

        assert_eq!(buffer.get(12), Some(VoxelColor::BLACK));
        assert_eq!(handler.stats.read().pixels_written, 2);
    }

    #[test]
    fn test_unroutable_universe_counts_once_per_packet() {
        let buffer = Arc::new(VoxelBuffer::new(20));
        let mut handler = handler(buffer.clone());

        handler.handle(&encode_dmx(5, 1, &[1, 2, 3]));
        handler.handle(&encode_dmx(5, 2, &[1, 2, 3]));

        let stats = *handler.stats.read();
        assert_eq!(stats.unroutable, 2);
        assert_eq!(handler.warned_universes.len(), 1);
        assert!(buffer.colors().iter().all(VoxelColor::is_black));
    }

    #[test]
    fn test_malformed_is_counted_and_ignored() {
        let buffer = Arc::new(VoxelBuffer::new(20));
        let mut handler = handler(buffer.clone());

        let mut packet = encode_dmx(0, 1, &[1, 2, 3]);
        packet[3] = b'x';
        handler.handle(&packet);
        handler.handle(&[0; 4]);

        assert_eq!(handler.stats.read().malformed, 2);
        assert_eq!(buffer.generation(), 0);
    }

    #[test]
    fn test_sync_wakes_readers() {
        let buffer = Arc::new(VoxelBuffer::new(20));
        let mut handler = handler(buffer.clone());

        handler.handle(&encode_sync());

        assert_eq!(handler.stats.read().sync_packets, 1);
        assert_eq!(buffer.generation(), 1);
    }

    #[test]
    fn test_bind_conflict_is_reported() {
        let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        let routes = ListenerRoutes::new(0, addr, HashMap::new());

        let result = ListenerWorker::spawn(
            routes,
            Arc::new(VoxelBuffer::new(1)),
            Arc::new(AtomicBool::new(true)),
        );
        assert!(matches!(result, Err(ControlError::BindError { .. })));
    }

    #[test]
    fn test_worker_closes_when_flag_cleared() {
        let routes = ListenerRoutes::new(0, "127.0.0.1:0".parse().unwrap(), HashMap::new());
        let running = Arc::new(AtomicBool::new(true));
        let mut worker =
            ListenerWorker::spawn(routes, Arc::new(VoxelBuffer::new(1)), running.clone()).unwrap();
        assert_ne!(worker.local_addr().port(), 0);

        running.store(false, Ordering::Relaxed);
        worker.join();
        assert_eq!(worker.state(), WorkerState::Closed);
    }

    #[test]
    fn test_receive_error_fails_only_that_worker() {
        let buffer = Arc::new(VoxelBuffer::new(20));
        let running = Arc::new(AtomicBool::new(true));
        let source = ScriptedSource::new(vec![
            Step::Datagram(encode_dmx(0, 1, &[7, 7, 7])),
            Step::Fail(io::Error::other("network is down")),
        ]);
        let local = "127.0.0.1:9".parse().unwrap();
        let mut worker =
            ListenerWorker::from_source(routes(), source, local, buffer.clone(), running.clone())
                .unwrap();

        assert!(wait_for_state(&worker, WorkerState::Failed));
        assert!(running.load(Ordering::Relaxed));
        assert_eq!(buffer.get(10), Some(VoxelColor::new(7, 7, 7)));
        assert_eq!(worker.stats().pixels_written, 1);

        worker.join();
        assert_eq!(worker.state(), WorkerState::Failed);
    }

    #[test]
    fn test_oversized_error_is_only_reported_on_windows() {
        let oversized = io::Error::from_raw_os_error(WSAEMSGSIZE);
        assert_eq!(is_oversized(&oversized), cfg!(windows));
        assert!(!is_oversized(&io::Error::other("network is down")));
    }

    #[cfg(windows)]
    #[test]
    fn test_oversized_datagram_is_dropped() {
        let buffer = Arc::new(VoxelBuffer::new(20));
        let running = Arc::new(AtomicBool::new(true));
        let source = ScriptedSource::new(vec![
            Step::Fail(io::Error::from_raw_os_error(WSAEMSGSIZE)),
            Step::Datagram(encode_dmx(0, 1, &[1, 2, 3])),
        ]);
        let local = "127.0.0.1:9".parse().unwrap();
        let mut worker =
            ListenerWorker::from_source(routes(), source, local, buffer.clone(), running.clone())
                .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while worker.stats().pixels_written == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(worker.stats().oversized, 1);
        assert_eq!(worker.state(), WorkerState::Receiving);

        running.store(false, Ordering::Relaxed);
        worker.join();
        assert_eq!(worker.state(), WorkerState::Closed);
    }
}
