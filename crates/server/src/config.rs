use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Datagram port; the stream listener binds `udp_port + 1`.
    pub udp_port: u16,
    pub tick_rate: u32,
    /// State broadcast cadence in ticks (3 at 60 Hz = 20 Hz snapshots).
    pub broadcast_every_n_ticks: u32,
    pub max_players: usize,
    pub client_timeout: Duration,
    pub ping_interval: Duration,
    /// Percent chance a formation follower carries a gun.
    pub shooter_percent: u8,
    /// Scales formation unit counts.
    pub count_multiplier: f32,
    /// Best-player score per boss spawn.
    pub boss_score_threshold: i32,
    /// Fixed RNG seed for replayable matches; random when absent.
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            udp_port: starlance::DEFAULT_UDP_PORT,
            tick_rate: 60,
            broadcast_every_n_ticks: 3,
            max_players: 5,
            client_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(1),
            shooter_percent: 30,
            count_multiplier: 1.0,
            boss_score_threshold: 15_000,
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    pub fn tcp_port(&self) -> u16 {
        self.udp_port + 1
    }

    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}
