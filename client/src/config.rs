use crate::connection::RetryPolicy;
use shared::{
    CELL_SIZE, COUNTDOWN_TICK_MS, DEATH_REVERT_DELAY_MS, DEFAULT_SERVER_URL,
    EFFECT_NOMINAL_SECS, MOVE_INTERVAL_MS,
};

/// Static startup configuration for one client session
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server_url: String,
    pub retry: RetryPolicy,
    pub move_interval_ms: u64,
    pub death_delay_ms: u64,
    pub countdown_tick_ms: u64,
    /// Denominator of the effect bar; does not follow the granted duration
    pub effect_total_secs: u64,
    pub cell_size: u32,
    /// Window size until the first snapshot arrives
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            retry: RetryPolicy::default(),
            move_interval_ms: MOVE_INTERVAL_MS,
            death_delay_ms: DEATH_REVERT_DELAY_MS,
            countdown_tick_ms: COUNTDOWN_TICK_MS,
            effect_total_secs: EFFECT_NOMINAL_SECS,
            cell_size: CELL_SIZE,
            window_width: 800,
            window_height: 600,
        }
    }
}
