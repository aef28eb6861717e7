//! Common utilities for usbip-vhci
//!
//! This crate provides functionality shared by the simulator and tooling
//! built on top of the PnP core: the error type used outside the core and
//! the tracing subscriber setup.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{LOG_LEVELS, setup_logging};
