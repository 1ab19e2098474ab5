//! HTTP reachability checking for the status monitor.
//!
//! This crate provides the pieces that turn a list of endpoints into a
//! stream of availability events:
//! - [`Probe`]: blocking request-with-timeout contract, with [`HttpProbe`]
//!   issuing `HEAD` requests through `reqwest`
//! - [`HealthTracker`]: one [`TargetState`] per target, transition
//!   classification into [`StatusEvent`]s
//!
//! # Example
//!
//! ```no_run
//! use healthcheck::{HealthTracker, HttpProbe, ProbeConfig, Target};
//!
//! # fn example() -> common::Result<()> {
//! let probe = HttpProbe::new(&ProbeConfig::default())?;
//! let mut tracker = HealthTracker::new(probe, vec![Target::new("web", "https://example.com")]);
//!
//! // Establish the baseline, then classify subsequent checks
//! tracker.baseline();
//! for event in tracker.sweep() {
//!     println!("{} is {} ({:?})", event.target_name, event.new_status, event.kind);
//! }
//! # Ok(())
//! # }
//! ```

pub mod probe;
pub mod tracker;
pub mod types;

pub use probe::{HttpProbe, Probe};
pub use tracker::{HealthTracker, classify};
pub use types::{
    EventKind, ProbeConfig, ProbeOutcome, ProbeResult, Status, StatusEvent, Target, TargetState,
};
