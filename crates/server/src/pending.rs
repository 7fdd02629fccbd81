use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// A reliable message awaiting application-level ACK: resent on a fixed
/// timer until the matching ACK arrives or the destination disappears.
#[derive(Debug, Clone)]
pub struct PendingReliable {
    pub packet: Vec<u8>,
    pub last_send: Instant,
    pub addr: SocketAddr,
}

/// Keyed reliable-message table shared by the color and game-over
/// retransmitters. Each carries its own mutex at the call site; this type
/// only holds the map itself.
#[derive(Debug, Default)]
pub struct PendingTable<K: std::hash::Hash + Eq + Clone> {
    entries: HashMap<K, PendingReliable>,
}

impl<K: std::hash::Hash + Eq + Clone> PendingTable<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, packet: Vec<u8>, addr: SocketAddr, now: Instant) {
        self.entries.insert(key, PendingReliable { packet, last_send: now, addr });
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Returns `(key, packet, addr)` for every entry whose `last_send` predates
    /// `now - timeout`, and bumps their `last_send` to `now`.
    pub fn due_for_retransmit(&mut self, now: Instant, timeout: std::time::Duration) -> Vec<(K, Vec<u8>, SocketAddr)> {
        let mut due = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if now.duration_since(entry.last_send) >= timeout {
                entry.last_send = now;
                due.push((key.clone(), entry.packet.clone(), entry.addr));
            }
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn insert_then_remove_clears_entry() {
        let mut table: PendingTable<u16> = PendingTable::new();
        table.insert(1, vec![0u8], addr(), Instant::now());
        assert_eq!(table.len(), 1);
        assert!(table.remove(&1));
        assert!(table.is_empty());
    }

    #[test]
    fn due_for_retransmit_only_returns_expired_entries() {
        let mut table: PendingTable<u16> = PendingTable::new();
        let now = Instant::now();
        table.insert(1, vec![0u8], addr(), now);
        let due = table.due_for_retransmit(now, std::time::Duration::from_millis(500));
        assert!(due.is_empty());

        let later = now + std::time::Duration::from_millis(600);
        let due = table.due_for_retransmit(later, std::time::Duration::from_millis(500));
        assert_eq!(due.len(), 1);
    }
}
