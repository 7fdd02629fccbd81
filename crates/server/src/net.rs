use std::net::SocketAddr;
use std::time::Instant;

use gridclash_protocol::{
    now_ms, EventAckPayload, EventPayload, GameOverAckPayload, JoinAckPayload, MsgType, PacketHeader,
    PlayerColorAckPayload, PlayerColorPayload, ProtocolError, W,
};

use crate::events::ServerEvent;
use crate::state::ServerState;

fn send(state: &ServerState, addr: SocketAddr, msg_type: MsgType, snapshot_id: u32, seq_num: u32, payload: &[u8]) {
    let header = PacketHeader::new(msg_type, snapshot_id, seq_num, now_ms(), payload.len() as u16);
    let mut packet = header.encode();
    packet.extend_from_slice(payload);
    if let Err(err) = state.socket.send_to(&packet, addr) {
        log::warn!("send to {addr} failed: {err}");
        return;
    }
    if let Some(player_id) = state.players.lock().unwrap().player_id_for(&addr) {
        state.bandwidth.lock().unwrap().add_sent(player_id, packet.len());
    }
}

/// Registers `(addr, player_id)` for reliable redelivery and sends the first copy.
fn send_reliable_color(state: &ServerState, addr: SocketAddr, player_id: u16, color: (u8, u8, u8)) {
    let payload = PlayerColorPayload { player_id, color }.encode();
    let header = PacketHeader::new(MsgType::PlayerColor, 0, 0, now_ms(), payload.len() as u16);
    let mut packet = header.encode();
    packet.extend_from_slice(&payload);

    if let Err(err) = state.socket.send_to(&packet, addr) {
        log::warn!("send PLAYER_COLOR to {addr} failed: {err}");
        return;
    }
    state
        .pending_color
        .lock()
        .unwrap()
        .insert((addr, player_id), packet, addr, Instant::now());
}

/// Decodes and dispatches one inbound datagram. Never panics on malformed
/// input — every error path here is the "silently drop" class from the
/// error-handling design.
pub fn handle_packet(state: &ServerState, from: SocketAddr, data: &[u8]) {
    if let Some(player_id) = state.players.lock().unwrap().player_id_for(&from) {
        state.bandwidth.lock().unwrap().add_recv(player_id, data.len());
    }

    let header = match PacketHeader::decode(data) {
        Ok(header) => header,
        Err(err) => {
            log::debug!("dropping packet from {from}: {err}");
            return;
        }
    };

    let payload = &data[gridclash_protocol::HEADER_SIZE..];

    match header.msg_type {
        MsgType::Join => handle_join(state, from),
        MsgType::Ready => handle_ready(state, from),
        MsgType::Event => {
            if let Err(err) = handle_event(state, from, payload) {
                log::debug!("bad EVENT from {from}: {err}");
            }
        }
        MsgType::Heartbeat => {
            state.players.lock().unwrap().touch_heartbeat(&from, Instant::now());
        }
        MsgType::PlayerColorAck => {
            if let Ok(ack) = PlayerColorAckPayload::decode(payload) {
                state.pending_color.lock().unwrap().remove(&(from, ack.player_id));
            }
        }
        MsgType::GameOverAck => {
            if let Ok(ack) = GameOverAckPayload::decode(payload) {
                state.pending_game_over.lock().unwrap().remove(&ack.player_id);
            }
        }
        other => {
            log::debug!("unexpected message type {:?} from {from}", other);
        }
    }
}

fn handle_join(state: &ServerState, from: SocketAddr) {
    let (player_id, is_new) = state.players.lock().unwrap().join(from, Instant::now());
    let color = state.players.lock().unwrap().get(player_id).map(|p| p.color).unwrap_or((0, 0, 0));

    log::info!("JOIN from {from} -> player {player_id}");

    let ack = JoinAckPayload {
        player_id,
        grid_size: W as u8,
        tick_rate: state.config.tick_rate as u8,
        color,
    };
    send(state, from, MsgType::JoinAck, 0, 1, &ack.encode());

    if !is_new {
        return;
    }

    state.push_event(ServerEvent::PlayerJoined { player_id, addr: from });

    // Tell the new player about every already-connected player's color, and
    // every already-connected player about the new player's color.
    let existing: Vec<(u16, SocketAddr, (u8, u8, u8))> = {
        let players = state.players.lock().unwrap();
        players
            .all_players()
            .filter(|p| p.player_id != player_id)
            .map(|p| (p.player_id, p.addr, p.color))
            .collect()
    };

    for (existing_id, _existing_addr, existing_color) in &existing {
        send_reliable_color(state, from, *existing_id, *existing_color);
    }
    for (_existing_id, existing_addr, _existing_color) in &existing {
        send_reliable_color(state, *existing_addr, player_id, color);
    }
}

fn handle_ready(state: &ServerState, from: SocketAddr) {
    let player_id = match state.players.lock().unwrap().mark_ready(from) {
        Some(id) => id,
        None => {
            log::debug!("READY from unknown endpoint {from}, ignoring");
            return;
        }
    };

    state.push_event(ServerEvent::PlayerReady { player_id });

    let color_map = state.players.lock().unwrap().color_map();
    for (pid, color) in color_map {
        let payload = PlayerColorPayload { player_id: pid, color }.encode();
        send(state, from, MsgType::PlayerColor, 0, 0, &payload);
    }
}

fn handle_event(state: &ServerState, from: SocketAddr, payload: &[u8]) -> Result<(), ProtocolError> {
    let event = EventPayload::decode(payload)?;

    let mapped = state.players.lock().unwrap().player_id_for(&from);
    if mapped != Some(event.player_id) {
        log::warn!(
            "EVENT from {from} with mismatched player_id {} (mapped {:?}), ignoring",
            event.player_id,
            mapped
        );
        return Ok(());
    }

    let seq = event.client_msg_seq as u32;
    let mut claimed = false;

    {
        let mut last_seqs = state.event_lock.lock().unwrap();
        let last_seq = last_seqs.get(&event.player_id).copied();
        if let Some(last) = last_seq {
            if seq <= last {
                send_event_ack(state, from, event.client_msg_seq);
                return Ok(());
            }
        }
        last_seqs.insert(event.player_id, seq);

        let cell_index = event.cell_index as usize;
        if cell_index < W * W {
            let mut grid = state.grid_lock.lock().unwrap();
            claimed = grid.claim(cell_index, event.player_id as u8);
        } else {
            log::warn!("invalid cell_index {cell_index} from player {}", event.player_id);
        }
    }

    send_event_ack(state, from, event.client_msg_seq);

    if claimed {
        state.push_event(ServerEvent::CellClaimed {
            player_id: event.player_id,
            cell_index: event.cell_index as usize,
        });

        let grid_full = state.grid_lock.lock().unwrap().is_full();
        let already_pending = state.game_over_sent.load(std::sync::atomic::Ordering::SeqCst);
        if grid_full && !already_pending {
            crate::workers::finalize_game_over(state);
        }
    }

    Ok(())
}

fn send_event_ack(state: &ServerState, addr: SocketAddr, seq: u16) {
    let payload = EventAckPayload { seq }.encode();
    send(state, addr, MsgType::EventAck, 0, seq as u32, &payload);
}
