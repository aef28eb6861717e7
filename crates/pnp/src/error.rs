//! PnP status and error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::{NodeId, NodeKind};

/// Failure outcome of a PnP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PnpError {
    /// Malformed request parameters (e.g. unknown device text type)
    #[error("invalid parameter")]
    InvalidParameter,

    /// Response storage could not be allocated
    #[error("insufficient resources")]
    InsufficientResources,

    /// Outstanding interface references prevent removal
    #[error("device busy")]
    DeviceBusy,

    /// The node has already been removed
    #[error("no such device")]
    NoSuchDevice,

    /// A collaborator refused the operation
    #[error("unsuccessful")]
    Unsuccessful,
}

/// Completion status carried by a PnP request
///
/// `NotSupported` is the status every request starts with; a request that
/// nobody answers is completed with it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    #[default]
    NotSupported,
    Failed(PnpError),
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl From<PnpError> for Status {
    fn from(err: PnpError) -> Self {
        Status::Failed(err)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => f.write_str("success"),
            Status::NotSupported => f.write_str("not supported"),
            Status::Failed(err) => write!(f, "{}", err),
        }
    }
}

/// Errors raised while assembling device nodes
#[derive(Debug, Error)]
pub enum NodeError {
    /// Functional kinds sit on top of a lower node
    #[error("{kind} node {id} requires a lower node")]
    MissingLower { id: NodeId, kind: NodeKind },

    /// Physical kinds complete requests themselves
    #[error("{kind} node {id} must not have a lower node")]
    UnexpectedLower { id: NodeId, kind: NodeKind },

    /// A node cannot be stacked on top of itself
    #[error("node {0} cannot be its own lower node")]
    SelfLink(NodeId),
}

/// Type alias for node construction results
pub type Result<T> = std::result::Result<T, NodeError>;
