//! Device node model
//!
//! Every device object in the virtual controller's stack is a [`DeviceNode`]:
//! the bus root, the controller's physical and functional objects, the hub's
//! physical and logical objects, and one virtual port per remote device.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::{NodeError, Result};
use crate::gate::{InterfaceRef, RefGate};

/// Stack-wide node identifier
///
/// Used by collaborators to resolve a node's lower link and to address nodes
/// in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural role of a node in the device stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Root-enumerated bus object (functional)
    Root,
    /// Controller object enumerated by the root (physical)
    ControllerPhysical,
    /// Virtual host controller (functional)
    ControllerFunctional,
    /// Hub object enumerated by the controller (physical)
    HubPhysical,
    /// Virtual root hub (functional)
    HubLogical,
    /// One remote device plugged into a hub port (physical)
    PortVirtual,
}

/// Default device descriptions, indexed by [`NodeKind::index`]
static DESCRIPTIONS: [&str; NodeKind::COUNT] = [
    "usbip-win ROOT",
    "usbip-win CPDO",
    "usbip-win VHCI",
    "usbip-win HPDO",
    "usbip-win VHUB",
    "usbip-win VPDO",
];

impl NodeKind {
    pub const COUNT: usize = 6;

    pub const ALL: [NodeKind; NodeKind::COUNT] = [
        NodeKind::Root,
        NodeKind::ControllerPhysical,
        NodeKind::ControllerFunctional,
        NodeKind::HubPhysical,
        NodeKind::HubLogical,
        NodeKind::PortVirtual,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Functional kinds are layered on a lower node and forward requests to it
    pub const fn is_stackable(self) -> bool {
        match self {
            NodeKind::Root | NodeKind::ControllerFunctional | NodeKind::HubLogical => true,
            NodeKind::ControllerPhysical | NodeKind::HubPhysical | NodeKind::PortVirtual => false,
        }
    }

    /// Human-readable description used when nothing better is known
    pub fn default_description(self) -> &'static str {
        DESCRIPTIONS[self.index()]
    }

    /// Short tag used in diagnostics
    pub const fn tag(self) -> &'static str {
        match self {
            NodeKind::Root => "ROOT",
            NodeKind::ControllerPhysical => "CPDO",
            NodeKind::ControllerFunctional => "VHCI",
            NodeKind::HubPhysical => "HPDO",
            NodeKind::HubLogical => "VHUB",
            NodeKind::PortVirtual => "VPDO",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// PnP status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Created,
    Started,
    StopPending,
    Stopped,
    RemovePending,
    SurpriseRemovePending,
    /// Terminal
    Removed,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 7] = [
        LifecycleState::Created,
        LifecycleState::Started,
        LifecycleState::StopPending,
        LifecycleState::Stopped,
        LifecycleState::RemovePending,
        LifecycleState::SurpriseRemovePending,
        LifecycleState::Removed,
    ];
}

#[derive(Debug, Clone, Copy, Default)]
struct StateSlot {
    current: LifecycleState,
    previous: LifecycleState,
}

/// A device object in the virtual controller's stack
#[derive(Debug)]
pub struct DeviceNode {
    id: NodeId,
    kind: NodeKind,
    lower: Option<NodeId>,
    state: Mutex<StateSlot>,
    refs: Arc<RefGate>,
}

impl DeviceNode {
    /// Create a node in the `Created` state
    ///
    /// # Errors
    ///
    /// Fails if `lower` is absent for a stackable kind, present for a
    /// non-stackable one, or points back at the node itself.
    pub fn new(id: NodeId, kind: NodeKind, lower: Option<NodeId>) -> Result<Self> {
        match (kind.is_stackable(), lower) {
            (true, None) => return Err(NodeError::MissingLower { id, kind }),
            (false, Some(_)) => return Err(NodeError::UnexpectedLower { id, kind }),
            (true, Some(lower)) if lower == id => return Err(NodeError::SelfLink(id)),
            _ => {}
        }

        Ok(Self {
            id,
            kind,
            lower,
            state: Mutex::new(StateSlot::default()),
            refs: Arc::new(RefGate::new()),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Next lower layer, present only for stackable kinds
    pub fn lower(&self) -> Option<NodeId> {
        self.lower
    }

    fn slot(&self) -> MutexGuard<'_, StateSlot> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current_state(&self) -> LifecycleState {
        self.slot().current
    }

    pub fn is_removed(&self) -> bool {
        self.current_state() == LifecycleState::Removed
    }

    /// Move to `state`, remembering the state being left
    pub(crate) fn set_state(&self, state: LifecycleState) {
        let mut slot = self.slot();
        slot.previous = slot.current;
        slot.current = state;
        debug!("{} {}: {:?} -> {:?}", self.kind, self.id, slot.previous, state);
    }

    /// Undo the last transition if the node is still in `pending`
    ///
    /// Returns `true` if the previous state was restored.
    pub(crate) fn restore_previous_state(&self, pending: LifecycleState) -> bool {
        let mut slot = self.slot();
        if slot.current != pending {
            return false;
        }
        slot.current = slot.previous;
        debug!("{} {}: {:?} -> {:?} (cancelled)", self.kind, self.id, pending, slot.current);
        true
    }

    /// Take an external reference, keeping Query-Remove from succeeding
    /// until the returned guard is dropped
    pub fn acquire_interface(&self) -> InterfaceRef {
        InterfaceRef::new(self.refs.clone())
    }

    pub fn external_ref_count(&self) -> usize {
        self.refs.count()
    }

    /// Removal admission test; never blocks
    pub fn can_remove(&self) -> bool {
        self.refs.is_drained()
    }
}

impl std::fmt::Display for DeviceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.kind, self.id)
    }
}
