use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::error::ProtocolError;

/// 4-byte ASCII tag identifying the GridClash wire protocol.
pub const PROTOCOL_ID: [u8; 4] = *b"GSCP";

/// Current wire protocol version. The source went through several
/// incompatible drafts; this is the latest (see DESIGN.md).
pub const PROTOCOL_VERSION: u8 = 7;

/// protocol_id(4) + version(1) + msg_type(1) + snapshot_id(4) + seq_num(4)
/// + timestamp_ms(8) + payload_len(2).
pub const HEADER_SIZE: usize = 24;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

/// True if `a` is logically ahead of `b` under u32 wraparound, the way
/// sequence numbers and snapshot ids are compared on both ends of the wire.
#[inline]
pub fn sequence_greater_than(a: u32, b: u32) -> bool {
    ((a > b) && (a - b <= SEQUENCE_WRAP_THRESHOLD)) || ((a < b) && (b - a > SEQUENCE_WRAP_THRESHOLD))
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Join = 1,
    JoinAck = 2,
    Ready = 3,
    PlayerColor = 4,
    PlayerColorAck = 5,
    Event = 6,
    EventAck = 7,
    Snapshot = 8,
    GameOver = 9,
    GameOverAck = 10,
    Heartbeat = 11,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Result<Self, ProtocolError> {
        Ok(match v {
            1 => MsgType::Join,
            2 => MsgType::JoinAck,
            3 => MsgType::Ready,
            4 => MsgType::PlayerColor,
            5 => MsgType::PlayerColorAck,
            6 => MsgType::Event,
            7 => MsgType::EventAck,
            8 => MsgType::Snapshot,
            9 => MsgType::GameOver,
            10 => MsgType::GameOverAck,
            11 => MsgType::Heartbeat,
            other => return Err(ProtocolError::UnknownMsgType(other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub msg_type: MsgType,
    /// for SNAPSHOT; 0 elsewhere.
    pub snapshot_id: u32,
    /// for EVENT (client) and retained for SNAPSHOT; may be 0.
    pub seq_num: u32,
    pub timestamp_ms: u64,
    pub payload_len: u16,
}

impl PacketHeader {
    pub fn new(msg_type: MsgType, snapshot_id: u32, seq_num: u32, timestamp_ms: u64, payload_len: u16) -> Self {
        Self {
            msg_type,
            snapshot_id,
            seq_num,
            timestamp_ms,
            payload_len,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&PROTOCOL_ID);
        buf.write_u8(PROTOCOL_VERSION).unwrap();
        buf.write_u8(self.msg_type as u8).unwrap();
        buf.write_u32::<BigEndian>(self.snapshot_id).unwrap();
        buf.write_u32::<BigEndian>(self.seq_num).unwrap();
        buf.write_u64::<BigEndian>(self.timestamp_ms).unwrap();
        buf.write_u16::<BigEndian>(self.payload_len).unwrap();
        buf
    }

    /// Decodes the header and returns it along with the number of bytes consumed.
    /// A datagram failing protocol id or version validation is an error the
    /// caller should treat as "silently drop", not surface to a user.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::ShortPacket(data.len()));
        }

        let mut cursor = Cursor::new(data);
        let mut protocol_id = [0u8; 4];
        cursor.read_exact(&mut protocol_id).map_err(|_| ProtocolError::ShortPacket(data.len()))?;
        if protocol_id != PROTOCOL_ID {
            return Err(ProtocolError::BadProtocolId);
        }

        let version = cursor.read_u8().map_err(|_| ProtocolError::ShortPacket(data.len()))?;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::BadVersion(version));
        }

        let msg_type = MsgType::from_u8(cursor.read_u8().unwrap())?;
        let snapshot_id = cursor.read_u32::<BigEndian>().unwrap();
        let seq_num = cursor.read_u32::<BigEndian>().unwrap();
        let timestamp_ms = cursor.read_u64::<BigEndian>().unwrap();
        let payload_len = cursor.read_u16::<BigEndian>().unwrap();

        Ok(Self {
            msg_type,
            snapshot_id,
            seq_num,
            timestamp_ms,
            payload_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = PacketHeader::new(MsgType::Snapshot, 42, 7, 1_700_000_000_123, 800);
        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_SIZE);
        let decoded = PacketHeader::decode(&bytes).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn rejects_short_packet() {
        let bytes = [0u8; 10];
        assert!(matches!(PacketHeader::decode(&bytes), Err(ProtocolError::ShortPacket(10))));
    }

    #[test]
    fn rejects_bad_protocol_id() {
        let mut bytes = PacketHeader::new(MsgType::Join, 0, 0, 0, 0).encode();
        bytes[0] = b'X';
        assert!(matches!(PacketHeader::decode(&bytes), Err(ProtocolError::BadProtocolId)));
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = PacketHeader::new(MsgType::Join, 0, 0, 0, 0).encode();
        bytes[4] = 1;
        assert!(matches!(PacketHeader::decode(&bytes), Err(ProtocolError::BadVersion(1))));
    }

    #[test]
    fn sequence_wraparound() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }
}
