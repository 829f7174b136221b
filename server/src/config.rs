use std::time::Duration;

/// Default port when none is given.
pub const DEFAULT_PORT: u16 = 8080;

/// Upper bound on a single frame write to one peer.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Frames a peer may have waiting before it is dropped as too slow.
pub const DEFAULT_MAX_QUEUED_FRAMES: usize = 256;

/// Runtime settings for the battle server.
///
/// Grid size, capacity and combat numbers are compile-time constants in
/// `shared`; only the network-facing knobs live here.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub write_timeout: Duration,
    pub max_queued_frames: usize,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_queued_frames: DEFAULT_MAX_QUEUED_FRAMES,
        }
    }
}
