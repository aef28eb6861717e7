//! Host-side simulator for the virtual host controller's device stack
//!
//! Builds the six-kind device stack from a TOML configuration, backs every
//! collaborator of the PnP core with in-memory state, and replays scripted
//! request sequences against it.

pub mod config;
pub mod script;
pub mod stack;

pub use config::{PortConfig, VhciConfig};
pub use script::{Script, Step, StepReport};
pub use stack::VirtualStack;
