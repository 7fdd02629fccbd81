use gridclash_protocol::{
    COLOR_TIMEOUT_MS, DEFAULT_PORT, DEFAULT_TICK_RATE, GAME_OVER_TIMEOUT_MS, HEARTBEAT_INTERVAL_MS,
    HEARTBEAT_TIMEOUT_MS, RETRANSMIT_GRANULARITY_MS,
};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub tick_rate: u32,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub color_timeout_ms: u64,
    pub game_over_timeout_ms: u64,
    pub retransmit_granularity_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tick_rate: DEFAULT_TICK_RATE,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            heartbeat_timeout_ms: HEARTBEAT_TIMEOUT_MS,
            color_timeout_ms: COLOR_TIMEOUT_MS,
            game_over_timeout_ms: GAME_OVER_TIMEOUT_MS,
            retransmit_granularity_ms: RETRANSMIT_GRANULARITY_MS,
        }
    }
}

impl ServerConfig {
    pub fn tick_interval_ms(&self) -> u64 {
        1000 / self.tick_rate as u64
    }
}
