//! Status monitor server.
//!
//! Probes a fixed list of HTTP endpoints on an interval and pushes every
//! result to connected observers over a minimal RFC 6455 text channel.
//!
//! # Architecture
//!
//! Everything runs on one thread:
//! - [`Reactor`]: readiness wait, accept, upgrade, frame handling, sweeps
//! - [`ConnectionRegistry`]: observers in registration order
//! - [`Readiness`]: the wait capability, backed by `poll(2)` in
//!   [`PollReadiness`]
//! - [`Notifier`]: console lines for alerts, recoveries and
//!   still-down notices
//!
//! Health state lives in [`healthcheck::HealthTracker`]; the wire format
//! comes from [`wsproto`].

pub mod config;
pub mod messages;
pub mod notifier;
pub mod reactor;
pub mod readiness;
pub mod registry;
pub mod types;

pub use config::{Config, ConfigError};
pub use messages::{ObserverCommand, ServerMessage, ServerPayload};
pub use notifier::{Notice, Notifier};
pub use reactor::Reactor;
pub use readiness::{LISTENER, PollReadiness, Readiness, Token};
pub use registry::{BroadcastReport, ConnectionRegistry, Observer, ObserverId};
pub use types::{ConsoleMode, ReactorState, ServerConfig, SweepKind};
