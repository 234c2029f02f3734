//! Common utilities and types shared across the LVS crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
