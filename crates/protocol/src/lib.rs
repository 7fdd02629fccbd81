//! The GridClash wire protocol: header framing, the message taxonomy, and
//! payload layouts. No I/O lives here — callers own the socket.

mod error;
mod header;
mod message;
mod palette;

pub use error::ProtocolError;
pub use header::{sequence_greater_than, MsgType, PacketHeader, HEADER_SIZE, PROTOCOL_ID, PROTOCOL_VERSION};
pub use message::{
    EventAckPayload, EventPayload, EventType, GameOverAckPayload, GameOverPayload, JoinAckPayload,
    PlayerColorAckPayload, PlayerColorPayload, PlayerScore, SnapshotPayload, GRID_CELLS, W,
};
pub use palette::{color_for_player, PLAYER_PALETTE};

/// Default UDP port for the GridClash server.
pub const DEFAULT_PORT: u16 = 5005;

/// Server tick / snapshot broadcast rate.
pub const DEFAULT_TICK_RATE: u32 = 20;

pub const HEARTBEAT_INTERVAL_MS: u64 = 1_000;
pub const HEARTBEAT_TIMEOUT_MS: u64 = 3_000;

pub const EVENT_TIMEOUT_MS: u64 = 300;
pub const EVENT_MAX_RETRIES: u32 = 6;

pub const COLOR_TIMEOUT_MS: u64 = 500;
pub const GAME_OVER_TIMEOUT_MS: u64 = 500;
pub const RETRANSMIT_GRANULARITY_MS: u64 = 50;

pub const CLIENT_SNAPSHOT_QUEUE_MAX: usize = 3;
pub const CLIENT_METRICS_LOG_EVERY: u32 = 10;

/// Returns the current wall clock as milliseconds since the epoch.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_plausible() {
        // Sanity bound: any time after 2020-01-01 in ms since epoch.
        assert!(now_ms() > 1_577_836_800_000);
    }
}
