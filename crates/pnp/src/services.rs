//! Collaborator interfaces consumed by the PnP core
//!
//! The core decides *when* a node starts, stops or goes away; the surrounding
//! driver decides *what* that means. Everything that touches the rest of the
//! system goes through [`StackServices`], and every response payload is
//! allocated through a [`ResponsePool`].

use crate::error::Status;
use crate::node::DeviceNode;
use crate::request::{BusInformation, PnpRequest};

/// Device property keys readable from the property store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProperty {
    DeviceDescription,
    LocationInformation,
}

/// Services provided by the surrounding device stack
pub trait StackServices {
    /// Send `request` to the node's lower layer and return its status
    ///
    /// Only called for nodes whose [`DeviceNode::lower`] is set.
    fn pass_down(&self, node: &DeviceNode, request: &mut PnpRequest) -> Status;

    /// Negotiate resources and relations for a starting node
    fn negotiate_start(&self, node: &DeviceNode) -> Status;

    /// Halt the node's active work
    fn negotiate_stop(&self, node: &DeviceNode) -> Status;

    /// Release everything the node owns
    fn negotiate_remove(&self, node: &DeviceNode) -> Status;

    /// Detach a virtual port from its hub
    fn unplug_port(&self, node: &DeviceNode);

    /// Read a string property from the device property store
    fn device_property(&self, node: &DeviceNode, key: DeviceProperty) -> Option<String>;

    /// Product string reported by the remote device behind a virtual port
    fn remote_product_string(&self, node: &DeviceNode) -> Option<String>;

    /// Answer a query the core does not interpret (relations, interfaces,
    /// capabilities, resources, ids) by filling in `request.io_status`
    ///
    /// The default leaves the request untouched.
    fn answer_query(&self, node: &DeviceNode, request: &mut PnpRequest) {
        let _ = (node, request);
    }
}

/// Allocator for response payloads
///
/// Returning `None` reports pool exhaustion; the handler then completes the
/// request without a payload.
pub trait ResponsePool {
    fn alloc_text(&self, text: &str) -> Option<String>;

    fn alloc_bus_information(&self, info: BusInformation) -> Option<Box<BusInformation>>;
}

/// [`ResponsePool`] backed by the global allocator
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPool;

impl ResponsePool for SystemPool {
    fn alloc_text(&self, text: &str) -> Option<String> {
        let mut s = String::new();
        s.try_reserve_exact(text.len()).ok()?;
        s.push_str(text);
        Some(s)
    }

    fn alloc_bus_information(&self, info: BusInformation) -> Option<Box<BusInformation>> {
        // Box allocation aborts on exhaustion instead of failing
        Some(Box::new(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_pool_copies_text() {
        let s = SystemPool.alloc_text("usbip-win VHUB").unwrap();
        assert_eq!(s, "usbip-win VHUB");
    }

    #[test]
    fn test_system_pool_bus_information() {
        let info = SystemPool.alloc_bus_information(BusInformation::USB).unwrap();
        assert_eq!(*info, BusInformation::USB);
    }
}
