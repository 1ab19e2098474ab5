//! Runtime configuration and shared enums for the status server.

use healthcheck::{ProbeConfig, Target};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (host:port)
    pub listen_addr: String,

    /// Pending connection queue length
    pub backlog: i32,

    /// Interval between scheduled sweeps
    pub sweep_interval: Duration,

    /// Upper bound of a single readiness wait
    pub poll_timeout: Duration,

    /// Time allowed for an accepted socket to complete the upgrade
    pub handshake_timeout: Duration,

    /// Bytes read from an observer per readiness event
    pub read_chunk_size: usize,

    /// Upper bound of buffered, not yet decodable observer input
    pub max_buffer_size: usize,

    /// Log a "still down" notice every N down-to-down checks
    pub still_down_every: u32,

    /// Console presentation policy
    pub console_mode: ConsoleMode,

    /// Probe timeouts and user agent
    pub probe: ProbeConfig,

    /// Monitored endpoints
    pub targets: Vec<Target>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            backlog: 5,
            sweep_interval: Duration::from_secs(30),
            poll_timeout: Duration::from_millis(100),
            handshake_timeout: Duration::from_secs(5),
            read_chunk_size: 2048,
            max_buffer_size: 64 * 1024,
            still_down_every: 10,
            console_mode: ConsoleMode::Quiet,
            probe: ProbeConfig::default(),
            targets: Vec::new(),
        }
    }
}

/// What the console shows for routine results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMode {
    /// Only alerts, recoveries and periodic still-down notices
    #[default]
    Quiet,
    /// Every check result
    Verbose,
}

/// Why a sweep runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    /// Interval elapsed
    Scheduled,
    /// An observer asked for it
    Forced,
}

/// Reactor phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorState {
    Idle,
    Accepting,
    Draining,
    Probing,
    Terminated,
}

impl fmt::Display for ReactorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactorState::Idle => write!(f, "IDLE"),
            ReactorState::Accepting => write!(f, "ACCEPTING"),
            ReactorState::Draining => write!(f, "DRAINING"),
            ReactorState::Probing => write!(f, "PROBING"),
            ReactorState::Terminated => write!(f, "TERMINATED"),
        }
    }
}
