//! Health check types and structures.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A monitored HTTP endpoint, keyed by its unique name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub url: String,
}

impl Target {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Availability of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not checked yet
    #[default]
    Unknown,
    /// Last check completed with a 2xx/3xx status
    Up,
    /// Last check failed or returned an error status
    Down,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unknown => write!(f, "unknown"),
            Status::Up => write!(f, "up"),
            Status::Down => write!(f, "down"),
        }
    }
}

/// Per-target state kept across checks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetState {
    pub status: Status,

    /// Consecutive checks that found the target down after a known status.
    /// Reset to 0 whenever the target is seen up.
    pub consecutive_down_count: u32,

    pub last_checked_at: Option<DateTime<Local>>,
}

/// Raw outcome reported by a [`Probe`](crate::probe::Probe)
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// HTTP status of the response, `None` when the request did not complete
    pub http_status: Option<u16>,

    /// Time spent on the request
    pub elapsed: Duration,

    /// Transport-level error description
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// A completed request
    pub fn response(http_status: u16, elapsed: Duration) -> Self {
        Self {
            http_status: Some(http_status),
            elapsed,
            error: None,
        }
    }

    /// A request that never produced a response
    pub fn failure(elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            http_status: None,
            elapsed,
            error: Some(error.into()),
        }
    }

    /// Completed with `200 <= status < 400`
    pub fn is_reachable(&self) -> bool {
        self.http_status
            .is_some_and(|code| (200..400).contains(&code))
    }
}

/// Result of one check of one target
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub target_name: String,
    pub reachable: bool,

    /// HTTP status, 0 when no response was received
    pub http_status: u16,

    /// Round-trip time in milliseconds (two decimals), present iff reachable
    pub latency_ms: Option<f64>,

    /// Failure description, present iff not reachable
    pub error: Option<String>,

    pub checked_at: DateTime<Local>,
}

impl ProbeResult {
    /// Derive a result from a raw probe outcome
    pub fn from_outcome(
        target_name: impl Into<String>,
        outcome: ProbeOutcome,
        checked_at: DateTime<Local>,
    ) -> Self {
        let reachable = outcome.is_reachable();
        let http_status = outcome.http_status.unwrap_or(0);

        let (latency_ms, error) = if reachable {
            let millis = outcome.elapsed.as_secs_f64() * 1000.0;
            (Some((millis * 100.0).round() / 100.0), None)
        } else {
            let error = outcome
                .error
                .or_else(|| {
                    outcome
                        .http_status
                        .map(|code| format!("Unexpected status code: {}", code))
                })
                .unwrap_or_else(|| "Request failed".to_string());
            (None, Some(error))
        };

        Self {
            target_name: target_name.into(),
            reachable,
            http_status,
            latency_ms,
            error,
            checked_at,
        }
    }

    pub fn status(&self) -> Status {
        if self.reachable { Status::Up } else { Status::Down }
    }
}

/// Classification of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Routine result, no operator-visible transition
    Update,
    /// Target went from up to down
    AlertDown,
    /// Target went from down to up
    AlertRecovered,
}

/// Event produced by every check
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub kind: EventKind,
    pub target_name: String,
    pub url: String,
    pub new_status: Status,
    pub previous_status: Status,

    /// `TargetState::consecutive_down_count` after this check
    pub consecutive_down_count: u32,

    pub detail: ProbeResult,
}

impl StatusEvent {
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.new_status
    }

    pub fn is_alert(&self) -> bool {
        self.kind != EventKind::Update
    }

    /// Whether a down-to-down check lands on the "still down" reminder cadence.
    ///
    /// Display policy only; it has no effect on target state.
    pub fn is_still_down_notice(&self, every: u32) -> bool {
        every > 0
            && self.previous_status == Status::Down
            && self.new_status == Status::Down
            && self.consecutive_down_count % every == 0
    }
}

/// HTTP probe settings
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
            user_agent: "Silent Server Monitor".to_string(),
        }
    }
}
