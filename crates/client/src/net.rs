use std::io;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use gridclash_protocol::{
    now_ms, EventAckPayload, EventPayload, EventType, GameOverAckPayload, GameOverPayload, MsgType, PacketHeader,
    PlayerColorAckPayload, PlayerColorPayload, SnapshotPayload, HEADER_SIZE,
};

use crate::session::ClientSession;
use crate::state::DecodedSnapshot;

/// Builds and sends one EVENT for `(row, col)`, registering it for best-effort
/// retransmission. `cell_index = row * grid_size + col`, matching the
/// server's row-major decoding.
pub fn submit_click(session: &ClientSession, row: u16, col: u16) {
    if session.game_over.load(Ordering::SeqCst) {
        log::debug!("ignoring click after GAME_OVER");
        return;
    }

    let cell_index = row * session.grid_size as u16 + col;
    let seq = session.next_event_seq();

    let payload = EventPayload {
        player_id: session.player_id,
        client_msg_seq: seq,
        event_type: EventType::Click,
        cell_index,
        client_timestamp: now_ms(),
    }
    .encode();

    let header = PacketHeader::new(MsgType::Event, 0, seq as u32, now_ms(), payload.len() as u16);
    let mut packet = header.encode();
    packet.extend_from_slice(&payload);

    if let Err(err) = session.socket.send(&packet) {
        log::warn!("failed to send EVENT: {err}");
    }

    session.pending_events.lock().unwrap().insert(seq, packet, cell_index, Instant::now());
}

/// Steady-state receive loop: runs until `shutdown()` or a `GAME_OVER_ACK` is
/// sent, dispatching every inbound datagram. Malformed packets are dropped
/// silently, matching the server's own error-handling posture.
pub fn receive_loop(session: &ClientSession) {
    session
        .socket
        .set_read_timeout(Some(Duration::from_millis(200)))
        .expect("socket still open");

    let mut buf = [0u8; 1200];
    while session.is_running() {
        match session.socket.recv(&mut buf) {
            Ok(len) => handle_packet(session, &buf[..len]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock || err.kind() == io::ErrorKind::TimedOut => continue,
            Err(err) => {
                log::warn!("recv failed: {err}");
                session.observables.set_error(format!("recv failed: {err}"));
            }
        }
    }
}

fn handle_packet(session: &ClientSession, data: &[u8]) {
    session.recv_bandwidth.lock().unwrap().add(data.len());

    let header = match PacketHeader::decode(data) {
        Ok(header) => header,
        Err(err) => {
            log::debug!("dropping packet: {err}");
            return;
        }
    };
    let payload = &data[HEADER_SIZE..];

    match header.msg_type {
        MsgType::Snapshot => handle_snapshot(session, &header, payload),
        MsgType::PlayerColor => handle_player_color(session, payload),
        MsgType::EventAck => handle_event_ack(session, payload),
        MsgType::GameOver => handle_game_over(session, payload),
        other => log::debug!("unexpected message type {:?} from server", other),
    }
}

fn handle_snapshot(session: &ClientSession, header: &PacketHeader, payload: &[u8]) {
    {
        let last_seen = session.last_seen_snapshot.lock().unwrap();
        if let Some(last_seen) = *last_seen {
            if !gridclash_protocol::sequence_greater_than(header.snapshot_id, last_seen) {
                return;
            }
        }
    }

    let snapshot = match SnapshotPayload::decode(payload) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            log::debug!("malformed SNAPSHOT: {err}");
            return;
        }
    };

    *session.last_seen_snapshot.lock().unwrap() = Some(header.snapshot_id);

    let recv_time_ms = now_ms();
    let count = session.snapshot_count.fetch_add(1, Ordering::SeqCst) + 1;

    let tick_interval_ms = 1000 / session.tick_rate.max(1) as u64;

    let mut previous_recv = session.prev_recv_time_ms.lock().unwrap();
    let latency = crate::metrics::latency_ms(recv_time_ms, header.timestamp_ms);
    let jitter = crate::metrics::jitter_ms(recv_time_ms, *previous_recv, tick_interval_ms);
    *previous_recv = Some(recv_time_ms);
    drop(previous_recv);

    if count % session.config.metrics_log_every == 0 {
        let bandwidth = session
            .recv_bandwidth
            .lock()
            .unwrap()
            .drain_kbps(Duration::from_millis(tick_interval_ms * session.config.metrics_log_every as u64));
        if let Err(err) = session.metrics.lock().unwrap().write_row(
            session.player_id,
            header.snapshot_id,
            header.seq_num,
            header.timestamp_ms,
            recv_time_ms,
            latency,
            jitter,
            bandwidth,
        ) {
            log::warn!("failed to write client_metrics.csv row: {err}");
        }
    }

    if let Err(err) = session.positions.lock().unwrap().write_row(session.player_id, recv_time_ms, &snapshot.current) {
        log::warn!("failed to write client_positions.csv row: {err}");
    }

    session.observables.push_snapshot(DecodedSnapshot {
        snapshot_id: header.snapshot_id,
        seq_num: header.seq_num,
        server_ts: header.timestamp_ms,
        recv_time_ms,
        grid: snapshot.current,
    });
}

fn handle_player_color(session: &ClientSession, payload: &[u8]) {
    let color = match PlayerColorPayload::decode(payload) {
        Ok(color) => color,
        Err(err) => {
            log::debug!("malformed PLAYER_COLOR: {err}");
            return;
        }
    };
    session.observables.install_color(color.player_id, color.color);

    let ack = PlayerColorAckPayload { player_id: color.player_id }.encode();
    let header = PacketHeader::new(MsgType::PlayerColorAck, 0, 0, now_ms(), ack.len() as u16);
    let mut packet = header.encode();
    packet.extend_from_slice(&ack);
    if let Err(err) = session.socket.send(&packet) {
        log::warn!("failed to send PLAYER_COLOR_ACK: {err}");
    }
}

fn handle_event_ack(session: &ClientSession, payload: &[u8]) {
    if let Ok(ack) = EventAckPayload::decode(payload) {
        session.pending_events.lock().unwrap().remove(ack.seq);
    }
}

fn handle_game_over(session: &ClientSession, payload: &[u8]) {
    let game_over = match GameOverPayload::decode(payload) {
        Ok(game_over) => game_over,
        Err(err) => {
            log::debug!("malformed GAME_OVER: {err}");
            return;
        }
    };

    session.game_over.store(true, Ordering::SeqCst);
    log::info!("GAME_OVER: winner={}, scores={:?}", game_over.winner_id, game_over.scores);

    let ack = GameOverAckPayload { player_id: session.player_id }.encode();
    let header = PacketHeader::new(MsgType::GameOverAck, 0, 0, now_ms(), ack.len() as u16);
    let mut packet = header.encode();
    packet.extend_from_slice(&ack);
    if let Err(err) = session.socket.send(&packet) {
        log::warn!("failed to send GAME_OVER_ACK: {err}");
    }
}
