use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::ProtocolError;

/// Grid side length. The grid itself is always `W * W` bytes.
pub const W: usize = 20;
pub const GRID_CELLS: usize = W * W;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Click = 0,
}

impl EventType {
    pub fn from_u8(v: u8) -> Result<Self, ProtocolError> {
        match v {
            0 => Ok(EventType::Click),
            other => Err(ProtocolError::UnknownMsgType(other)),
        }
    }
}

/// `JOIN_ACK` payload: `{player_id(2), grid_size(1), tick_rate(1), r(1), g(1), b(1)}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinAckPayload {
    pub player_id: u16,
    pub grid_size: u8,
    pub tick_rate: u8,
    pub color: (u8, u8, u8),
}

impl JoinAckPayload {
    pub const SIZE: usize = 7;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.write_u16::<BigEndian>(self.player_id).unwrap();
        buf.write_u8(self.grid_size).unwrap();
        buf.write_u8(self.tick_rate).unwrap();
        buf.write_u8(self.color.0).unwrap();
        buf.write_u8(self.color.1).unwrap();
        buf.write_u8(self.color.2).unwrap();
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        expect_len("JOIN_ACK", Self::SIZE, data.len())?;
        let mut cursor = Cursor::new(data);
        let player_id = cursor.read_u16::<BigEndian>().unwrap();
        let grid_size = cursor.read_u8().unwrap();
        let tick_rate = cursor.read_u8().unwrap();
        let r = cursor.read_u8().unwrap();
        let g = cursor.read_u8().unwrap();
        let b = cursor.read_u8().unwrap();
        Ok(Self {
            player_id,
            grid_size,
            tick_rate,
            color: (r, g, b),
        })
    }
}

/// `PLAYER_COLOR` payload: `{player_id(2), r(1), g(1), b(1)}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerColorPayload {
    pub player_id: u16,
    pub color: (u8, u8, u8),
}

impl PlayerColorPayload {
    pub const SIZE: usize = 5;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.write_u16::<BigEndian>(self.player_id).unwrap();
        buf.write_u8(self.color.0).unwrap();
        buf.write_u8(self.color.1).unwrap();
        buf.write_u8(self.color.2).unwrap();
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        expect_len("PLAYER_COLOR", Self::SIZE, data.len())?;
        let mut cursor = Cursor::new(data);
        let player_id = cursor.read_u16::<BigEndian>().unwrap();
        let r = cursor.read_u8().unwrap();
        let g = cursor.read_u8().unwrap();
        let b = cursor.read_u8().unwrap();
        Ok(Self {
            player_id,
            color: (r, g, b),
        })
    }
}

/// `PLAYER_COLOR_ACK` payload: `{player_id(2)}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerColorAckPayload {
    pub player_id: u16,
}

impl PlayerColorAckPayload {
    pub const SIZE: usize = 2;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.write_u16::<BigEndian>(self.player_id).unwrap();
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        expect_len("PLAYER_COLOR_ACK", Self::SIZE, data.len())?;
        let mut cursor = Cursor::new(data);
        Ok(Self {
            player_id: cursor.read_u16::<BigEndian>().unwrap(),
        })
    }
}

/// `EVENT` payload: `{player_id(2), client_msg_seq(2), event_type(1), cell_index(2), client_timestamp(8)}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventPayload {
    pub player_id: u16,
    pub client_msg_seq: u16,
    pub event_type: EventType,
    pub cell_index: u16,
    pub client_timestamp: u64,
}

impl EventPayload {
    pub const SIZE: usize = 15;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.write_u16::<BigEndian>(self.player_id).unwrap();
        buf.write_u16::<BigEndian>(self.client_msg_seq).unwrap();
        buf.write_u8(self.event_type as u8).unwrap();
        buf.write_u16::<BigEndian>(self.cell_index).unwrap();
        buf.write_u64::<BigEndian>(self.client_timestamp).unwrap();
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < Self::SIZE {
            return Err(ProtocolError::BadPayloadLen {
                what: "EVENT",
                expected: Self::SIZE,
                got: data.len(),
            });
        }
        let mut cursor = Cursor::new(data);
        let player_id = cursor.read_u16::<BigEndian>().unwrap();
        let client_msg_seq = cursor.read_u16::<BigEndian>().unwrap();
        let event_type = EventType::from_u8(cursor.read_u8().unwrap())?;
        let cell_index = cursor.read_u16::<BigEndian>().unwrap();
        let client_timestamp = cursor.read_u64::<BigEndian>().unwrap();
        Ok(Self {
            player_id,
            client_msg_seq,
            event_type,
            cell_index,
            client_timestamp,
        })
    }
}

/// `EVENT_ACK` payload: `{seq(2)}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventAckPayload {
    pub seq: u16,
}

impl EventAckPayload {
    pub const SIZE: usize = 2;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.write_u16::<BigEndian>(self.seq).unwrap();
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        expect_len("EVENT_ACK", Self::SIZE, data.len())?;
        let mut cursor = Cursor::new(data);
        Ok(Self {
            seq: cursor.read_u16::<BigEndian>().unwrap(),
        })
    }
}

/// `SNAPSHOT` payload: `current_grid || previous_grid`, each `W*W` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPayload {
    pub current: Vec<u8>,
    pub previous: Vec<u8>,
}

impl SnapshotPayload {
    pub const SIZE: usize = GRID_CELLS * 2;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.current);
        buf.extend_from_slice(&self.previous);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        expect_len("SNAPSHOT", Self::SIZE, data.len())?;
        Ok(Self {
            current: data[..GRID_CELLS].to_vec(),
            previous: data[GRID_CELLS..Self::SIZE].to_vec(),
        })
    }
}

/// One player's final tally in a `GAME_OVER` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerScore {
    pub player_id: u16,
    pub score: u16,
}

/// `GAME_OVER` payload: `{winner_id(2), num_players(1), [player_id(2), score(2)] * num_players}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOverPayload {
    pub winner_id: u16,
    pub scores: Vec<PlayerScore>,
}

impl GameOverPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + self.scores.len() * 4);
        buf.write_u16::<BigEndian>(self.winner_id).unwrap();
        buf.write_u8(self.scores.len() as u8).unwrap();
        for entry in &self.scores {
            buf.write_u16::<BigEndian>(entry.player_id).unwrap();
            buf.write_u16::<BigEndian>(entry.score).unwrap();
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < 3 {
            return Err(ProtocolError::Truncated("GAME_OVER header"));
        }
        let mut cursor = Cursor::new(data);
        let winner_id = cursor.read_u16::<BigEndian>().unwrap();
        let num_players = cursor.read_u8().unwrap() as usize;

        let expected = 3 + num_players * 4;
        if data.len() < expected {
            return Err(ProtocolError::BadPayloadLen {
                what: "GAME_OVER",
                expected,
                got: data.len(),
            });
        }

        let mut scores = Vec::with_capacity(num_players);
        for _ in 0..num_players {
            let player_id = cursor.read_u16::<BigEndian>().unwrap();
            let score = cursor.read_u16::<BigEndian>().unwrap();
            scores.push(PlayerScore { player_id, score });
        }
        Ok(Self { winner_id, scores })
    }
}

/// `GAME_OVER_ACK` payload: `{player_id(2)}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOverAckPayload {
    pub player_id: u16,
}

impl GameOverAckPayload {
    pub const SIZE: usize = 2;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.write_u16::<BigEndian>(self.player_id).unwrap();
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        expect_len("GAME_OVER_ACK", Self::SIZE, data.len())?;
        let mut cursor = Cursor::new(data);
        Ok(Self {
            player_id: cursor.read_u16::<BigEndian>().unwrap(),
        })
    }
}

fn expect_len(what: &'static str, expected: usize, got: usize) -> Result<(), ProtocolError> {
    if got != expected {
        return Err(ProtocolError::BadPayloadLen { what, expected, got });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_ack_round_trip() {
        let payload = JoinAckPayload {
            player_id: 3,
            grid_size: 20,
            tick_rate: 20,
            color: (0, 255, 0),
        };
        let bytes = payload.encode();
        assert_eq!(bytes.len(), JoinAckPayload::SIZE);
        assert_eq!(JoinAckPayload::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn player_color_round_trip() {
        let payload = PlayerColorPayload {
            player_id: 9,
            color: (1, 2, 3),
        };
        let bytes = payload.encode();
        assert_eq!(PlayerColorPayload::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn event_round_trip() {
        let payload = EventPayload {
            player_id: 1,
            client_msg_seq: 42,
            event_type: EventType::Click,
            cell_index: 399,
            client_timestamp: 1_700_000_000_000,
        };
        let bytes = payload.encode();
        assert_eq!(bytes.len(), EventPayload::SIZE);
        assert_eq!(EventPayload::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn event_decode_rejects_short_payload() {
        let bytes = [0u8; 4];
        assert!(EventPayload::decode(&bytes).is_err());
    }

    #[test]
    fn snapshot_round_trip() {
        let payload = SnapshotPayload {
            current: vec![1u8; GRID_CELLS],
            previous: vec![0u8; GRID_CELLS],
        };
        let bytes = payload.encode();
        assert_eq!(bytes.len(), SnapshotPayload::SIZE);
        assert_eq!(SnapshotPayload::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn game_over_round_trip() {
        let payload = GameOverPayload {
            winner_id: 2,
            scores: vec![
                PlayerScore { player_id: 1, score: 150 },
                PlayerScore { player_id: 2, score: 250 },
            ],
        };
        let bytes = payload.encode();
        assert_eq!(GameOverPayload::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn game_over_empty_scores() {
        let payload = GameOverPayload {
            winner_id: 0,
            scores: vec![],
        };
        let bytes = payload.encode();
        assert_eq!(bytes.len(), 3);
        assert_eq!(GameOverPayload::decode(&bytes).unwrap(), payload);
    }
}
