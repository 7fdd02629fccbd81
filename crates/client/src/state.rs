use std::collections::{HashMap, VecDeque};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct DecodedSnapshot {
    pub snapshot_id: u32,
    pub seq_num: u32,
    pub server_ts: u64,
    pub recv_time_ms: u64,
    pub grid: Vec<u8>,
}

/// How `latest()` picks a snapshot to hand the renderer. `FreshestWins` is
/// the default; `Buffered` holds back by `delay_ms` to smooth jitter, the
/// way the original client's `BUFFER_DELAY_MS` playout buffer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    FreshestWins,
    Buffered { delay_ms: u64 },
}

impl Default for InterpolationMode {
    fn default() -> Self {
        InterpolationMode::FreshestWins
    }
}

/// Bounded FIFO of decoded snapshots awaiting render; producer is the
/// receive thread, consumer is whatever polls `latest()`. Overflow drops the
/// oldest to favor freshness (§3 "client-side snapshot buffer").
#[derive(Debug)]
pub struct SnapshotBuffer {
    entries: VecDeque<DecodedSnapshot>,
    capacity: usize,
    mode: InterpolationMode,
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        Self::with_mode(capacity, InterpolationMode::default())
    }

    pub fn with_mode(capacity: usize, mode: InterpolationMode) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            mode,
        }
    }

    pub fn push(&mut self, entry: DecodedSnapshot) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Under `FreshestWins`, the most recently pushed entry. Under
    /// `Buffered`, the newest entry at least `delay_ms` old, falling back to
    /// the oldest buffered entry if none qualifies yet.
    pub fn latest(&self) -> Option<&DecodedSnapshot> {
        match self.mode {
            InterpolationMode::FreshestWins => self.entries.back(),
            InterpolationMode::Buffered { delay_ms } => {
                let newest = self.entries.back()?;
                let cutoff = newest.recv_time_ms.saturating_sub(delay_ms);
                self.entries
                    .iter()
                    .rev()
                    .find(|e| e.recv_time_ms <= cutoff)
                    .or_else(|| self.entries.front())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A submitted click awaiting `EVENT_ACK`, tracked for the 300ms/6-retry
/// best-effort retransmission policy.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub packet: Vec<u8>,
    pub cell_index: u16,
    pub last_send: Instant,
    pub tries: u32,
}

#[derive(Debug, Default)]
pub struct PendingEvents {
    entries: HashMap<u16, PendingEvent>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn insert(&mut self, seq: u16, packet: Vec<u8>, cell_index: u16, now: Instant) {
        self.entries.insert(
            seq,
            PendingEvent {
                packet,
                cell_index,
                last_send: now,
                tries: 1,
            },
        );
    }

    pub fn remove(&mut self, seq: u16) -> bool {
        self.entries.remove(&seq).is_some()
    }

    pub fn pending_cells(&self) -> Vec<u16> {
        self.entries.values().map(|e| e.cell_index).collect()
    }

    /// Returns packets due for resend (bumping `last_send`/`tries`), dropping
    /// any entry that has exhausted its retry budget.
    pub fn due_for_retransmit(&mut self, now: Instant, timeout: std::time::Duration, max_retries: u32) -> Vec<Vec<u8>> {
        let mut due = Vec::new();
        self.entries.retain(|_seq, entry| {
            if now.duration_since(entry.last_send) < timeout {
                return true;
            }
            if entry.tries >= max_retries {
                return false;
            }
            entry.last_send = now;
            entry.tries += 1;
            due.push(entry.packet.clone());
            true
        });
        due
    }
}

/// The three observables exposed to the (out-of-scope) renderer, plus the
/// pending-cell overlay. A plain struct rather than a trait: there is exactly
/// one implementation and no swappable renderer in this repo.
#[derive(Debug, Default)]
pub struct ClientObservables {
    pub snapshots: std::sync::Mutex<Option<SnapshotBuffer>>,
    pub colors: std::sync::Mutex<HashMap<u16, (u8, u8, u8)>>,
    pub last_error: std::sync::Mutex<Option<String>>,
}

impl ClientObservables {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            snapshots: std::sync::Mutex::new(Some(SnapshotBuffer::new(queue_capacity))),
            colors: std::sync::Mutex::new(HashMap::new()),
            last_error: std::sync::Mutex::new(None),
        }
    }

    pub fn push_snapshot(&self, entry: DecodedSnapshot) {
        if let Some(buffer) = self.snapshots.lock().unwrap().as_mut() {
            buffer.push(entry);
        }
    }

    pub fn latest_snapshot(&self) -> Option<DecodedSnapshot> {
        self.snapshots.lock().unwrap().as_ref().and_then(|b| b.latest().cloned())
    }

    pub fn install_color(&self, player_id: u16, color: (u8, u8, u8)) {
        self.colors.lock().unwrap().insert(player_id, color);
    }

    pub fn colors(&self) -> HashMap<u16, (u8, u8, u8)> {
        self.colors.lock().unwrap().clone()
    }

    pub fn set_error(&self, message: impl Into<String>) {
        *self.last_error.lock().unwrap() = Some(message.into());
    }

    /// Consumed and cleared by the renderer each frame.
    pub fn take_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_buffer_drops_oldest_on_overflow() {
        let mut buffer = SnapshotBuffer::new(3);
        for i in 0..5 {
            buffer.push(DecodedSnapshot {
                snapshot_id: i,
                seq_num: i,
                server_ts: 0,
                recv_time_ms: 0,
                grid: vec![],
            });
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.latest().unwrap().snapshot_id, 4);
    }

    #[test]
    fn buffered_mode_holds_back_until_delay_elapses() {
        let mut buffer = SnapshotBuffer::with_mode(5, InterpolationMode::Buffered { delay_ms: 100 });
        for i in 0..3 {
            buffer.push(DecodedSnapshot {
                snapshot_id: i,
                seq_num: i,
                server_ts: 0,
                recv_time_ms: i as u64 * 50,
                grid: vec![],
            });
        }
        // newest is at t=100, cutoff is 0, so only the t=0 entry qualifies.
        assert_eq!(buffer.latest().unwrap().snapshot_id, 0);
    }

    #[test]
    fn pending_events_drop_after_max_retries() {
        let mut pending = PendingEvents::new();
        let start = Instant::now();
        pending.insert(1, vec![0u8], 5, start);

        let timeout = std::time::Duration::from_millis(300);
        let mut now = start;
        for attempt in 1..6 {
            now += timeout + std::time::Duration::from_millis(1);
            let due = pending.due_for_retransmit(now, timeout, 6);
            assert_eq!(due.len(), 1, "attempt {attempt}");
        }

        now += timeout + std::time::Duration::from_millis(1);
        let due = pending.due_for_retransmit(now, timeout, 6);
        assert!(due.is_empty());
        assert!(pending.pending_cells().is_empty());
    }
}
