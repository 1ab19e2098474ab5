//! Operator-facing console lines for check results.
//!
//! Only presentation is decided here; tracker state and broadcasts are not
//! affected by the console mode.

use crate::types::{ConsoleMode, SweepKind};
use healthcheck::{EventKind, Status, StatusEvent};
use std::time::Duration;
use tracing::{error, info, warn};

/// What to print for one event
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Target went down
    Down,
    /// Target came back
    Recovered,
    /// Target has been down for about `minutes`
    StillDown { minutes: u64 },
    /// Routine status line
    Status,
}

/// Decides and emits console lines
#[derive(Debug, Clone)]
pub struct Notifier {
    mode: ConsoleMode,
    still_down_every: u32,
    sweep_interval: Duration,
}

impl Notifier {
    pub fn new(mode: ConsoleMode, still_down_every: u32, sweep_interval: Duration) -> Self {
        Self {
            mode,
            still_down_every,
            sweep_interval,
        }
    }

    /// Console notice for `event`, if any
    pub fn notice(&self, event: &StatusEvent, sweep: SweepKind) -> Option<Notice> {
        match event.kind {
            EventKind::AlertDown => return Some(Notice::Down),
            EventKind::AlertRecovered => return Some(Notice::Recovered),
            EventKind::Update => {}
        }

        if event.is_still_down_notice(self.still_down_every) {
            let minutes =
                self.sweep_interval.as_secs() * u64::from(event.consecutive_down_count) / 60;
            return Some(Notice::StillDown { minutes });
        }

        if sweep == SweepKind::Forced || self.mode == ConsoleMode::Verbose {
            return Some(Notice::Status);
        }
        None
    }

    /// Log the notice for `event`; returns what was logged
    pub fn report(&self, event: &StatusEvent, sweep: SweepKind) -> Option<Notice> {
        let notice = self.notice(event, sweep)?;
        let name = &event.target_name;
        let url = &event.url;

        match &notice {
            Notice::Down => {
                let reason = event.detail.error.as_deref().unwrap_or("Unknown error");
                error!(target_name = %name, url = %url, reason = %reason, "CRITICAL: server is DOWN");
            }
            Notice::Recovered => match event.detail.latency_ms {
                Some(ms) => info!(target_name = %name, url = %url, response_ms = ms, "RECOVERED: server is back up"),
                None => info!(target_name = %name, url = %url, "RECOVERED: server is back up"),
            },
            Notice::StillDown { minutes } => warn!(
                target_name = %name,
                down_checks = event.consecutive_down_count,
                minutes = *minutes,
                "Server still down"
            ),
            Notice::Status => match (event.new_status, event.detail.latency_ms) {
                (Status::Up, Some(ms)) => {
                    info!(target_name = %name, status = %event.new_status, response_ms = ms, "Check result")
                }
                _ => {
                    let reason = event.detail.error.as_deref().unwrap_or("Unknown error");
                    info!(target_name = %name, status = %event.new_status, reason = %reason, "Check result")
                }
            },
        }
        Some(notice)
    }
}
