use std::collections::{HashMap, VecDeque};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use crate::config::ServerConfig;
use crate::events::ServerEvent;
use crate::grid::Grid;
use crate::metrics::BandwidthTracker;
use crate::pending::PendingTable;
use crate::players::PlayerRegistry;

/// Everything the server's five threads share. Mirrors the "one server-state
/// aggregate passed explicitly to workers" redesign: every field that used to
/// be a loose global in the source gets its own mutex here.
pub struct ServerState {
    pub config: ServerConfig,
    pub socket: UdpSocket,
    pub running: AtomicBool,

    /// Protects the grid itself; taken by event processing (after `event_lock`)
    /// and by the snapshot broadcaster.
    pub grid_lock: Mutex<Grid>,

    /// Serializes the sequence-number dedup check and the subsequent grid
    /// mutation for a given EVENT, keyed by `player_id`. Acquire order is
    /// always `event_lock` then `grid_lock`.
    pub event_lock: Mutex<HashMap<u16, u32>>,

    pub players: Mutex<PlayerRegistry>,
    pub pending_color: Mutex<PendingTable<(SocketAddr, u16)>>,
    pub pending_game_over: Mutex<PendingTable<u16>>,
    pub bandwidth: Mutex<BandwidthTracker>,
    pub events: Mutex<VecDeque<ServerEvent>>,

    pub next_snapshot_id: AtomicU32,
    pub last_snapshot_bytes: Mutex<Option<Vec<u8>>>,
    pub game_over_sent: AtomicBool,
}

impl ServerState {
    pub fn new(config: ServerConfig, socket: UdpSocket) -> Self {
        Self {
            config,
            socket,
            running: AtomicBool::new(true),
            grid_lock: Mutex::new(Grid::new()),
            event_lock: Mutex::new(HashMap::new()),
            players: Mutex::new(PlayerRegistry::new()),
            pending_color: Mutex::new(PendingTable::new()),
            pending_game_over: Mutex::new(PendingTable::new()),
            bandwidth: Mutex::new(BandwidthTracker::default()),
            events: Mutex::new(VecDeque::new()),
            next_snapshot_id: AtomicU32::new(0),
            last_snapshot_bytes: Mutex::new(None),
            game_over_sent: AtomicBool::new(false),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr().expect("bound socket always has a local addr")
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn push_event(&self, event: ServerEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    pub fn drain_events(&self) -> Vec<ServerEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}
