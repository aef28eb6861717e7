//! In-memory virtual controller device stack
//!
//! Assembles the six node kinds the way the virtual host controller lays
//! them out and provides every collaborator the PnP core consumes:
//!
//! ```text
//!   ROOT #1   -> system root (outside the simulated stack)
//!   CPDO #2      enumerated by ROOT
//!   VHCI #3   -> CPDO #2
//!   HPDO #4      enumerated by VHCI
//!   VHUB #5   -> HPDO #4
//!   VPDO #1NN    one per attached port NN, enumerated by VHUB
//! ```
//!
//! Passing a request down dispatches it into the lower node through the same
//! entry point, so a functional node and its physical node move together.

use common::{Error, Result};
use pnp::{
    DeviceNode, DeviceProperty, Dispatcher, InterfaceRef, NodeId, NodeKind, Payload, PnpError,
    PnpRequest, RequestSubtype, StackServices, Status,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::{PortConfig, PropertySettings, VhciConfig};

/// Lower link of the root node; owned by the host, not simulated
pub const SYSTEM_ROOT: NodeId = NodeId(0);
pub const ROOT: NodeId = NodeId(1);
pub const CONTROLLER_PHYSICAL: NodeId = NodeId(2);
pub const CONTROLLER_FUNCTIONAL: NodeId = NodeId(3);
pub const HUB_PHYSICAL: NodeId = NodeId(4);
pub const HUB_LOGICAL: NodeId = NodeId(5);

const PORT_BASE: u32 = 100;

/// Node id of the virtual port plugged into hub port `port`
pub fn port_id(port: u8) -> NodeId {
    NodeId(PORT_BASE + u32::from(port))
}

#[derive(Debug)]
struct PortSlot {
    config: PortConfig,
    plugged: bool,
    unplugs: usize,
}

/// The simulated device stack and its collaborator services
pub struct VirtualStack {
    nodes: BTreeMap<NodeId, Arc<DeviceNode>>,
    ports: Mutex<HashMap<NodeId, PortSlot>>,
    properties: PropertySettings,
    held: Mutex<HashMap<NodeId, Vec<InterfaceRef>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl VirtualStack {
    pub fn from_config(config: &VhciConfig) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        let layout = [
            (ROOT, NodeKind::Root, Some(SYSTEM_ROOT)),
            (CONTROLLER_PHYSICAL, NodeKind::ControllerPhysical, None),
            (CONTROLLER_FUNCTIONAL, NodeKind::ControllerFunctional, Some(CONTROLLER_PHYSICAL)),
            (HUB_PHYSICAL, NodeKind::HubPhysical, None),
            (HUB_LOGICAL, NodeKind::HubLogical, Some(HUB_PHYSICAL)),
        ];
        for (id, kind, lower) in layout {
            nodes.insert(id, Arc::new(DeviceNode::new(id, kind, lower)?));
        }

        let mut ports = HashMap::new();
        for port in &config.ports {
            let id = port_id(port.port);
            nodes.insert(id, Arc::new(DeviceNode::new(id, NodeKind::PortVirtual, None)?));
            ports.insert(
                id,
                PortSlot {
                    config: port.clone(),
                    plugged: true,
                    unplugs: 0,
                },
            );
        }

        info!(
            "Assembled device stack: {} nodes, {} ports attached",
            nodes.len(),
            ports.len()
        );

        Ok(Self {
            nodes,
            ports: Mutex::new(ports),
            properties: config.properties.clone(),
            held: Mutex::new(HashMap::new()),
        })
    }

    pub fn node(&self, id: NodeId) -> Result<&Arc<DeviceNode>> {
        self.nodes.get(&id).ok_or(Error::UnknownNode(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<DeviceNode>> {
        self.nodes.values()
    }

    /// Resolve a node name (`root`, `cpdo`, `vhci`, `hpdo`, `vhub`, `portN`)
    /// or a numeric id (`5`, `#5`)
    pub fn resolve(&self, name: &str) -> Result<NodeId> {
        let name = name.trim().to_ascii_lowercase();
        let id = match name.as_str() {
            "root" => ROOT,
            "cpdo" => CONTROLLER_PHYSICAL,
            "vhci" => CONTROLLER_FUNCTIONAL,
            "hpdo" => HUB_PHYSICAL,
            "vhub" => HUB_LOGICAL,
            other => {
                let parsed = match other.strip_prefix("port") {
                    Some(port) => port.parse::<u8>().map(port_id),
                    None => other.trim_start_matches('#').parse::<u32>().map(NodeId),
                };
                parsed.map_err(|_| Error::Script(format!("unknown node name '{}'", name)))?
            }
        };
        self.node(id).map(|node| node.id())
    }

    /// Display name of a node, inverse of [`VirtualStack::resolve`]
    pub fn name_of(&self, id: NodeId) -> String {
        match id {
            ROOT => "root".to_string(),
            CONTROLLER_PHYSICAL => "cpdo".to_string(),
            CONTROLLER_FUNCTIONAL => "vhci".to_string(),
            HUB_PHYSICAL => "hpdo".to_string(),
            HUB_LOGICAL => "vhub".to_string(),
            NodeId(n) if n > PORT_BASE => format!("port{}", n - PORT_BASE),
            other => other.to_string(),
        }
    }

    /// Send one PnP request to a node through the dispatch entry point
    pub fn dispatch(&self, id: NodeId, request: &mut PnpRequest) -> Result<Status> {
        let node = self.node(id)?;
        Ok(Dispatcher::new(self).dispatch(node, request))
    }

    /// Take an interface reference on behalf of an external holder
    ///
    /// Returns the node's reference count afterwards.
    pub fn acquire(&self, id: NodeId) -> Result<usize> {
        let node = self.node(id)?;
        lock(&self.held)
            .entry(id)
            .or_default()
            .push(node.acquire_interface());
        Ok(node.external_ref_count())
    }

    /// Drop the most recently taken interface reference on a node
    pub fn release(&self, id: NodeId) -> Result<usize> {
        let node = self.node(id)?;
        let released = lock(&self.held).get_mut(&id).and_then(Vec::pop);
        if released.is_none() {
            return Err(Error::Script(format!(
                "no interface reference held on {}",
                self.name_of(id)
            )));
        }
        drop(released);
        Ok(node.external_ref_count())
    }

    pub fn is_plugged(&self, id: NodeId) -> bool {
        lock(&self.ports).get(&id).is_some_and(|slot| slot.plugged)
    }

    /// Number of times a port has been unplugged through its hub
    pub fn unplug_count(&self, id: NodeId) -> usize {
        lock(&self.ports).get(&id).map_or(0, |slot| slot.unplugs)
    }

    fn with_port<T>(&self, id: NodeId, f: impl FnOnce(&mut PortSlot) -> T) -> Option<T> {
        lock(&self.ports).get_mut(&id).map(f)
    }
}

/// The host's root bus completes lifecycle requests it receives and leaves
/// everything else untouched
fn complete_at_system_root(request: &mut PnpRequest) -> Status {
    use RequestSubtype::*;
    if let Some(
        Start | QueryRemove | Remove | CancelRemove | Stop | QueryStop | CancelStop
        | SurpriseRemove,
    ) = request.subtype()
    {
        request.io_status.status = Status::Success;
    }
    request.status()
}

impl StackServices for VirtualStack {
    fn pass_down(&self, node: &DeviceNode, request: &mut PnpRequest) -> Status {
        let Some(lower) = node.lower() else {
            warn!("{}: pass down without a lower node", node);
            return request.status();
        };

        match self.nodes.get(&lower) {
            Some(lower_node) => Dispatcher::new(self).dispatch(lower_node, request),
            None => {
                debug!("{}: {} handled by the system root", node, request.ordinal());
                complete_at_system_root(request)
            }
        }
    }

    fn negotiate_start(&self, node: &DeviceNode) -> Status {
        match node.kind() {
            NodeKind::PortVirtual if !self.is_plugged(node.id()) => {
                warn!("{}: remote device is no longer plugged in", node);
                PnpError::Unsuccessful.into()
            }
            _ => {
                debug!("{}: resources negotiated", node);
                Status::Success
            }
        }
    }

    fn negotiate_stop(&self, node: &DeviceNode) -> Status {
        debug!("{}: active work halted", node);
        Status::Success
    }

    fn negotiate_remove(&self, node: &DeviceNode) -> Status {
        if node.kind() == NodeKind::PortVirtual {
            self.with_port(node.id(), |slot| slot.plugged = false);
        }
        debug!("{}: owned resources released", node);
        Status::Success
    }

    fn unplug_port(&self, node: &DeviceNode) {
        let unplugs = self.with_port(node.id(), |slot| {
            slot.plugged = false;
            slot.unplugs += 1;
            slot.unplugs
        });
        match unplugs {
            Some(n) => info!("{}: unplugged from hub ({} time(s))", node, n),
            None => warn!("{}: not attached to the hub", node),
        }
    }

    fn device_property(&self, node: &DeviceNode, key: DeviceProperty) -> Option<String> {
        match (key, node.kind()) {
            (DeviceProperty::DeviceDescription, NodeKind::PortVirtual) => self
                .with_port(node.id(), |slot| slot.config.description.clone())
                .flatten(),
            (DeviceProperty::DeviceDescription, kind) => {
                self.properties.description(kind).map(str::to_string)
            }
            (DeviceProperty::LocationInformation, NodeKind::PortVirtual) => {
                self.with_port(node.id(), |slot| slot.config.location())
            }
            (DeviceProperty::LocationInformation, _) => None,
        }
    }

    fn remote_product_string(&self, node: &DeviceNode) -> Option<String> {
        self.with_port(node.id(), |slot| {
            if slot.plugged {
                slot.config.product.clone()
            } else {
                None
            }
        })
        .flatten()
    }

    fn answer_query(&self, node: &DeviceNode, request: &mut PnpRequest) {
        // Physical objects report their hardware id
        if request.subtype() == Some(RequestSubtype::QueryId) && !node.kind().is_stackable() {
            let id = format!("USBIP\\{}", node.kind().tag());
            request.io_status.information = Some(Payload::Opaque(id.into_bytes()));
            request.io_status.status = Status::Success;
        }
    }
}
