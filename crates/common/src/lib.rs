//! Common utilities and types shared across the status monitor crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
