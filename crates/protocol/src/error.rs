#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("packet of {0} bytes shorter than header")]
    ShortPacket(usize),
    #[error("unknown protocol id")]
    BadProtocolId,
    #[error("unsupported protocol version {0}")]
    BadVersion(u8),
    #[error("unknown message type {0}")]
    UnknownMsgType(u8),
    #[error("payload length {got} does not match expected {expected} for {what}")]
    BadPayloadLen {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("truncated payload while reading {0}")]
    Truncated(&'static str),
}
