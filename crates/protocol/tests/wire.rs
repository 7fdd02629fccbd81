use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use gridclash_protocol::{
    now_ms, EventPayload, EventType, JoinAckPayload, MsgType, PacketHeader, SnapshotPayload, GRID_CELLS,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(2, Ordering::SeqCst)
}

fn bind_pair() -> (UdpSocket, UdpSocket, SocketAddr, SocketAddr) {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let client_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();

    let server = UdpSocket::bind(server_addr).unwrap();
    let client = UdpSocket::bind(client_addr).unwrap();
    server.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    client.set_read_timeout(Some(Duration::from_millis(200))).unwrap();

    (server, client, server_addr, client_addr)
}

#[test]
fn join_then_join_ack_round_trip_over_udp() {
    let (server, client, server_addr, _client_addr) = bind_pair();

    let join = PacketHeader::new(MsgType::Join, 0, 0, now_ms(), 0);
    client.send_to(&join.encode(), server_addr).unwrap();

    let mut buf = [0u8; 1200];
    let (len, from) = server.recv_from(&mut buf).unwrap();
    let header = PacketHeader::decode(&buf[..len]).unwrap();
    assert_eq!(header.msg_type, MsgType::Join);
    assert_eq!(header.payload_len, 0);

    let ack_payload = JoinAckPayload {
        player_id: 1,
        grid_size: 20,
        tick_rate: 20,
        color: (255, 0, 0),
    };
    let ack_header = PacketHeader::new(MsgType::JoinAck, 0, 1, now_ms(), ack_payload.encode().len() as u16);
    let mut packet = ack_header.encode();
    packet.extend_from_slice(&ack_payload.encode());
    server.send_to(&packet, from).unwrap();

    let (len, _) = client.recv_from(&mut buf).unwrap();
    let decoded_header = PacketHeader::decode(&buf[..len]).unwrap();
    assert_eq!(decoded_header.msg_type, MsgType::JoinAck);
    let decoded_payload = JoinAckPayload::decode(&buf[gridclash_protocol::HEADER_SIZE..len]).unwrap();
    assert_eq!(decoded_payload, ack_payload);
}

#[test]
fn event_over_udp_carries_cell_index() {
    let (server, client, server_addr, _client_addr) = bind_pair();

    let event = EventPayload {
        player_id: 1,
        client_msg_seq: 5,
        event_type: EventType::Click,
        cell_index: 210,
        client_timestamp: now_ms(),
    };
    let header = PacketHeader::new(MsgType::Event, 0, event.client_msg_seq as u32, event.client_timestamp, event.encode().len() as u16);
    let mut packet = header.encode();
    packet.extend_from_slice(&event.encode());
    client.send_to(&packet, server_addr).unwrap();

    let mut buf = [0u8; 1200];
    let (len, _) = server.recv_from(&mut buf).unwrap();
    let decoded_header = PacketHeader::decode(&buf[..len]).unwrap();
    assert_eq!(decoded_header.msg_type, MsgType::Event);
    let decoded_event = EventPayload::decode(&buf[gridclash_protocol::HEADER_SIZE..len]).unwrap();
    assert_eq!(decoded_event, event);
}

#[test]
fn snapshot_payload_survives_a_full_packet() {
    let (server, client, server_addr, _client_addr) = bind_pair();

    let snapshot = SnapshotPayload {
        current: vec![3u8; GRID_CELLS],
        previous: vec![0u8; GRID_CELLS],
    };
    let header = PacketHeader::new(MsgType::Snapshot, 7, 7, now_ms(), snapshot.encode().len() as u16);
    let mut packet = header.encode();
    packet.extend_from_slice(&snapshot.encode());
    server.send_to(&packet, client.local_addr().unwrap()).unwrap();
    let _ = server_addr;

    let mut buf = [0u8; 1200];
    let (len, _) = client.recv_from(&mut buf).unwrap();
    let decoded_header = PacketHeader::decode(&buf[..len]).unwrap();
    assert_eq!(decoded_header.snapshot_id, 7);
    let decoded = SnapshotPayload::decode(&buf[gridclash_protocol::HEADER_SIZE..len]).unwrap();
    assert_eq!(decoded, snapshot);
}
