use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use gridclash_protocol::{now_ms, JoinAckPayload, MsgType, PacketHeader};

use crate::config::ClientConfig;
use crate::metrics::{ClientMetricsWriter, ClientPositionsWriter};
use crate::state::{ClientObservables, PendingEvents};

/// Byte counters for the client's own receive-bandwidth column, mirrors the
/// server's `BandwidthTracker` but single-player so there is no map.
#[derive(Debug, Default)]
pub struct RecvBandwidth {
    bytes: u64,
}

impl RecvBandwidth {
    pub fn add(&mut self, bytes: usize) {
        self.bytes += bytes as u64;
    }

    pub fn drain_kbps(&mut self, window: Duration) -> f64 {
        let bits = self.bytes * 8;
        self.bytes = 0;
        if window.as_secs_f64() <= 0.0 {
            return 0.0;
        }
        bits as f64 / 1000.0 / window.as_secs_f64()
    }
}

/// Everything the client's threads share once the handshake completes:
/// identity assigned by `JOIN_ACK`, plus every mutable piece of state the
/// receive loop, retransmit worker, and heartbeat emitter touch.
pub struct ClientSession {
    pub config: ClientConfig,
    pub socket: UdpSocket,
    pub server_addr: SocketAddr,

    pub player_id: u16,
    pub grid_size: u8,
    pub tick_rate: u8,
    pub own_color: (u8, u8, u8),

    pub running: AtomicBool,
    pub game_over: AtomicBool,
    pub next_seq: AtomicU16,
    pub last_seen_snapshot: Mutex<Option<u32>>,
    pub snapshot_count: AtomicU32,
    pub prev_recv_time_ms: Mutex<Option<u64>>,

    pub observables: ClientObservables,
    pub pending_events: Mutex<PendingEvents>,
    pub recv_bandwidth: Mutex<RecvBandwidth>,
    pub metrics: Mutex<ClientMetricsWriter>,
    pub positions: Mutex<ClientPositionsWriter>,
}

impl ClientSession {
    /// Performs the JOIN/JOIN_ACK/READY handshake and returns a session ready
    /// for the steady-state threads. Resends JOIN forever on timeout, same as
    /// the source's blocking connect loop (no bounded retry count for JOIN).
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let server_addr = config
            .server_addr
            .to_socket_addrs()
            .with_context(|| format!("resolving {}", config.server_addr))?
            .next()
            .with_context(|| format!("no address for {}", config.server_addr))?;

        let socket = UdpSocket::bind("0.0.0.0:0").context("binding client socket")?;
        socket.connect(server_addr).context("connecting client socket")?;
        socket.set_read_timeout(Some(Duration::from_secs(1)))?;

        let ack = send_join_until_acked(&socket)?;
        log::info!(
            "joined as player {} (grid {}x{}, {}Hz)",
            ack.player_id,
            ack.grid_size,
            ack.grid_size,
            ack.tick_rate
        );

        send_ready(&socket)?;

        let metrics = ClientMetricsWriter::create("client_metrics.csv").context("opening client_metrics.csv")?;
        let positions = ClientPositionsWriter::create("client_positions.csv").context("opening client_positions.csv")?;
        let observables = ClientObservables::new(config.snapshot_queue_max);

        Ok(Self {
            config,
            socket,
            server_addr,
            player_id: ack.player_id,
            grid_size: ack.grid_size,
            tick_rate: ack.tick_rate,
            own_color: ack.color,
            running: AtomicBool::new(true),
            game_over: AtomicBool::new(false),
            next_seq: AtomicU16::new(1),
            last_seen_snapshot: Mutex::new(None),
            snapshot_count: AtomicU32::new(0),
            prev_recv_time_ms: Mutex::new(None),
            observables,
            pending_events: Mutex::new(PendingEvents::new()),
            recv_bandwidth: Mutex::new(RecvBandwidth::default()),
            metrics: Mutex::new(metrics),
            positions: Mutex::new(positions),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn next_event_seq(&self) -> u16 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }
}

fn send_join_until_acked(socket: &UdpSocket) -> Result<JoinAckPayload> {
    let header = PacketHeader::new(MsgType::Join, 0, 0, now_ms(), 0);
    let packet = header.encode();
    let mut buf = [0u8; 1200];

    loop {
        socket.send(&packet).context("sending JOIN")?;
        match socket.recv(&mut buf) {
            Ok(len) => match PacketHeader::decode(&buf[..len]) {
                Ok(header) if header.msg_type == MsgType::JoinAck => {
                    match JoinAckPayload::decode(&buf[gridclash_protocol::HEADER_SIZE..len]) {
                        Ok(ack) => return Ok(ack),
                        Err(err) => log::debug!("malformed JOIN_ACK: {err}"),
                    }
                }
                Ok(_) => continue,
                Err(err) => log::debug!("dropping unparseable packet while joining: {err}"),
            },
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock || err.kind() == std::io::ErrorKind::TimedOut => {
                log::warn!("JOIN timed out, retrying");
                continue;
            }
            Err(err) => bail!("recv failed during handshake: {err}"),
        }
    }
}

fn send_ready(socket: &UdpSocket) -> Result<()> {
    let header = PacketHeader::new(MsgType::Ready, 0, 0, now_ms(), 0);
    let packet = header.encode();
    for _ in 0..3 {
        socket.send(&packet).context("sending READY")?;
        std::thread::sleep(Duration::from_millis(100));
    }
    Ok(())
}
