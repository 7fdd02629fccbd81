use std::time::{Duration, Instant};

use gridclash_protocol::{now_ms, MsgType, PacketHeader, RETRANSMIT_GRANULARITY_MS};

use crate::session::ClientSession;

/// Every `RETRANSMIT_GRANULARITY_MS`, resends any EVENT whose
/// `event_timeout_ms` has elapsed, dropping it after `event_max_retries`.
pub fn event_retransmitter(session: &ClientSession) {
    let granularity = Duration::from_millis(RETRANSMIT_GRANULARITY_MS);
    let timeout = Duration::from_millis(session.config.event_timeout_ms);

    while session.is_running() {
        let due = session
            .pending_events
            .lock()
            .unwrap()
            .due_for_retransmit(Instant::now(), timeout, session.config.event_max_retries);

        for packet in due {
            if let Err(err) = session.socket.send(&packet) {
                log::warn!("event retransmit failed: {err}");
            }
        }

        std::thread::sleep(granularity);
    }
}

/// Sends an empty HEARTBEAT once a second, same cadence as the server's
/// timeout monitor expects.
pub fn heartbeat_emitter(session: &ClientSession) {
    while session.is_running() {
        let header = PacketHeader::new(MsgType::Heartbeat, 0, 0, now_ms(), 0);
        if let Err(err) = session.socket.send(&header.encode()) {
            log::warn!("heartbeat send failed: {err}");
        }
        std::thread::sleep(Duration::from_secs(1));
    }
}
