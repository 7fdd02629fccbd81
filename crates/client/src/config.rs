use gridclash_protocol::{CLIENT_METRICS_LOG_EVERY, CLIENT_SNAPSHOT_QUEUE_MAX, EVENT_MAX_RETRIES, EVENT_TIMEOUT_MS};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub event_timeout_ms: u64,
    pub event_max_retries: u32,
    pub snapshot_queue_max: usize,
    pub metrics_log_every: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", gridclash_protocol::DEFAULT_PORT),
            event_timeout_ms: EVENT_TIMEOUT_MS,
            event_max_retries: EVENT_MAX_RETRIES,
            snapshot_queue_max: CLIENT_SNAPSHOT_QUEUE_MAX,
            metrics_log_every: CLIENT_METRICS_LOG_EVERY,
        }
    }
}
