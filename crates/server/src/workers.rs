use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gridclash_protocol::{now_ms, GameOverPayload, MsgType, PacketHeader, PlayerScore, SnapshotPayload};

use crate::events::{DisconnectReason, ServerEvent};
use crate::metrics::{ServerMetricsWriter, ServerPositionsWriter};
use crate::state::ServerState;

/// Runs at `config.tick_rate` Hz: composes `current || previous`, broadcasts
/// to every ready player, and flushes the two server-side CSV logs.
pub fn snapshot_broadcaster(state: Arc<ServerState>, mut metrics: ServerMetricsWriter, mut positions: ServerPositionsWriter) {
    let tick_interval = Duration::from_millis(state.config.tick_interval_ms());
    let mut last_flush = Instant::now();

    while state.is_running() {
        let tick_start = Instant::now();
        let now = now_ms();

        let current = state.grid_lock.lock().unwrap().as_bytes().to_vec();
        let previous = {
            let mut last = state.last_snapshot_bytes.lock().unwrap();
            let previous = last.clone().unwrap_or_else(|| current.clone());
            *last = Some(current.clone());
            previous
        };

        let snapshot_id = state.next_snapshot_id.fetch_add(1, Ordering::SeqCst);
        let payload = SnapshotPayload { current: current.clone(), previous }.encode();
        let header = PacketHeader::new(MsgType::Snapshot, snapshot_id, snapshot_id, now, payload.len() as u16);
        let mut packet = header.encode();
        packet.extend_from_slice(&payload);

        let ready_addrs: Vec<(u16, std::net::SocketAddr)> = {
            let players = state.players.lock().unwrap();
            players.ready_players().map(|p| (p.player_id, p.addr)).collect()
        };

        for (player_id, addr) in &ready_addrs {
            if let Err(err) = state.socket.send_to(&packet, addr) {
                log::warn!("snapshot send to {addr} failed: {err}");
                continue;
            }
            state.bandwidth.lock().unwrap().add_sent(*player_id, packet.len());
        }

        if Instant::now().duration_since(last_flush) >= Duration::from_secs(1) {
            let rows = state.bandwidth.lock().unwrap().drain_kbps();
            if let Err(err) = metrics.write_tick(now, &rows) {
                log::warn!("failed to write server_metrics.csv row: {err}");
            }
            last_flush = Instant::now();
        }

        if let Err(err) = positions.write_row(snapshot_id, now, &current) {
            log::warn!("failed to write server_positions.csv row: {err}");
        }

        let elapsed = tick_start.elapsed();
        if elapsed < tick_interval {
            std::thread::sleep(tick_interval - elapsed);
        }
    }
}

/// Every `retransmit_granularity_ms`, resends any PLAYER_COLOR whose
/// `color_timeout_ms` has elapsed. No retry cap — colors are essential and small.
pub fn color_retransmitter(state: Arc<ServerState>) {
    let granularity = Duration::from_millis(state.config.retransmit_granularity_ms);
    let timeout = Duration::from_millis(state.config.color_timeout_ms);

    while state.is_running() {
        let due = state.pending_color.lock().unwrap().due_for_retransmit(Instant::now(), timeout);
        for (_key, packet, addr) in due {
            if let Err(err) = state.socket.send_to(&packet, addr) {
                log::warn!("color retransmit to {addr} failed: {err}");
            }
        }
        std::thread::sleep(granularity);
    }
}

/// Identical retransmit policy to `color_retransmitter`, keyed by `player_id`.
pub fn game_over_retransmitter(state: Arc<ServerState>) {
    let granularity = Duration::from_millis(state.config.retransmit_granularity_ms);
    let timeout = Duration::from_millis(state.config.game_over_timeout_ms);

    while state.is_running() {
        let due = state.pending_game_over.lock().unwrap().due_for_retransmit(Instant::now(), timeout);
        for (_key, packet, addr) in due {
            if let Err(err) = state.socket.send_to(&packet, addr) {
                log::warn!("game-over retransmit to {addr} failed: {err}");
            }
        }
        std::thread::sleep(granularity);
    }
}

/// Every second, drops any player silent for longer than `heartbeat_timeout_ms`.
pub fn heartbeat_monitor(state: Arc<ServerState>) {
    let interval = Duration::from_millis(state.config.heartbeat_interval_ms);
    let timeout = Duration::from_millis(state.config.heartbeat_timeout_ms);

    while state.is_running() {
        let evicted = state.players.lock().unwrap().evict_stale(Instant::now(), timeout);
        for player_id in evicted {
            log::info!("player {player_id} evicted on heartbeat timeout");
            state.push_event(ServerEvent::PlayerLeft {
                player_id,
                reason: DisconnectReason::HeartbeatTimeout,
            });
        }
        std::thread::sleep(interval);
    }
}

/// Tallies the grid, picks a winner by `argmax` (ties broken by grid iteration
/// order), and registers the payload for reliable delivery to every connected
/// player.
pub fn finalize_game_over(state: &ServerState) {
    state.game_over_sent.store(true, Ordering::SeqCst);

    let tally = state.grid_lock.lock().unwrap().tally();
    // `tally` is already in first-seen order; fold with a strict `>` so the
    // first player to reach the top score wins ties, not the last.
    let winner_id = tally
        .iter()
        .fold(None, |best: Option<(u8, u16)>, &(pid, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((pid, score)),
        })
        .map(|(pid, _)| pid)
        .unwrap_or(0);

    let scores: Vec<PlayerScore> = tally
        .into_iter()
        .map(|(pid, score)| PlayerScore { player_id: pid as u16, score })
        .collect();

    let payload = GameOverPayload { winner_id: winner_id as u16, scores }.encode();
    let now = now_ms();
    let header = PacketHeader::new(MsgType::GameOver, 0, 0, now, payload.len() as u16);
    let mut packet = header.encode();
    packet.extend_from_slice(&payload);

    let recipients: Vec<(u16, std::net::SocketAddr)> = {
        let players = state.players.lock().unwrap();
        players.ready_players().map(|p| (p.player_id, p.addr)).collect()
    };

    for (player_id, addr) in recipients {
        if let Err(err) = state.socket.send_to(&packet, addr) {
            log::warn!("game-over send to {addr} failed: {err}");
            continue;
        }
        state
            .pending_game_over
            .lock()
            .unwrap()
            .insert(player_id, packet.clone(), addr, Instant::now());
    }

    state.push_event(ServerEvent::GameOver { winner_id: winner_id as u16 });
    log::info!("GAME_OVER sent, winner={winner_id}");
}
