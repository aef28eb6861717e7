//! Common error types

use pnp::{NodeError, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Device stack error: {0}")]
    Stack(#[from] NodeError),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Script error: {0}")]
    Script(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
