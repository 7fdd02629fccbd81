use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use gridclash_protocol::color_for_player;

#[derive(Debug, Clone)]
pub struct Player {
    pub player_id: u16,
    pub addr: SocketAddr,
    pub color: (u8, u8, u8),
    pub last_heartbeat: Instant,
    /// Set once the player has sent READY; only ready players receive snapshots.
    pub ready: bool,
}

/// Tracks joined players by both address and id, mirroring the connection
/// bookkeeping pattern of a connection manager, minus any handshake-salt state
/// this protocol doesn't use.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    addr_to_id: HashMap<SocketAddr, u16>,
    players: HashMap<u16, Player>,
    next_player_id: u16,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            addr_to_id: HashMap::new(),
            players: HashMap::new(),
            next_player_id: 1,
        }
    }

    /// Returns the existing player for `addr`, or allocates a fresh id and
    /// color and registers a new player (re-JOIN from a known endpoint is
    /// idempotent, per invariant I2).
    pub fn join(&mut self, addr: SocketAddr, now: Instant) -> (u16, bool) {
        if let Some(&player_id) = self.addr_to_id.get(&addr) {
            return (player_id, false);
        }

        let player_id = self.next_player_id;
        self.next_player_id += 1;

        self.addr_to_id.insert(addr, player_id);
        self.players.insert(
            player_id,
            Player {
                player_id,
                addr,
                color: color_for_player(player_id),
                last_heartbeat: now,
                ready: false,
            },
        );

        (player_id, true)
    }

    pub fn mark_ready(&mut self, addr: SocketAddr) -> Option<u16> {
        let player_id = *self.addr_to_id.get(&addr)?;
        if let Some(player) = self.players.get_mut(&player_id) {
            player.ready = true;
        }
        Some(player_id)
    }

    pub fn player_id_for(&self, addr: &SocketAddr) -> Option<u16> {
        self.addr_to_id.get(addr).copied()
    }

    pub fn touch_heartbeat(&mut self, addr: &SocketAddr, now: Instant) {
        if let Some(&player_id) = self.addr_to_id.get(addr) {
            if let Some(player) = self.players.get_mut(&player_id) {
                player.last_heartbeat = now;
            }
        }
    }

    pub fn ready_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.ready)
    }

    pub fn all_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn color_map(&self) -> HashMap<u16, (u8, u8, u8)> {
        self.players.iter().map(|(&id, p)| (id, p.color)).collect()
    }

    pub fn get(&self, player_id: u16) -> Option<&Player> {
        self.players.get(&player_id)
    }

    /// Removes players whose heartbeat is older than `timeout`; returns their ids.
    pub fn evict_stale(&mut self, now: Instant, timeout: std::time::Duration) -> Vec<u16> {
        let stale: Vec<u16> = self
            .players
            .values()
            .filter(|p| now.duration_since(p.last_heartbeat) > timeout)
            .map(|p| p.player_id)
            .collect();

        for player_id in &stale {
            if let Some(player) = self.players.remove(player_id) {
                self.addr_to_id.remove(&player.addr);
            }
        }

        stale
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn join_assigns_monotonic_ids() {
        let mut registry = PlayerRegistry::new();
        let now = Instant::now();
        let (id1, is_new1) = registry.join(addr(1), now);
        let (id2, is_new2) = registry.join(addr(2), now);
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert!(is_new1 && is_new2);
    }

    #[test]
    fn rejoin_from_known_addr_is_idempotent() {
        let mut registry = PlayerRegistry::new();
        let now = Instant::now();
        let (id1, _) = registry.join(addr(1), now);
        let (id2, is_new) = registry.join(addr(1), now);
        assert_eq!(id1, id2);
        assert!(!is_new);
    }

    #[test]
    fn evict_stale_removes_silent_players() {
        let mut registry = PlayerRegistry::new();
        let old = Instant::now() - std::time::Duration::from_secs(10);
        registry.join(addr(1), old);
        let evicted = registry.evict_stale(Instant::now(), std::time::Duration::from_secs(3));
        assert_eq!(evicted, vec![1]);
        assert!(registry.is_empty());
    }
}
