//! Plug-and-Play lifecycle core for the usbip virtual host controller
//!
//! Every device object of the virtual controller's stack (the bus root, the
//! controller's physical and functional objects, the hub's physical and
//! logical objects, and one virtual port per remote device) obeys the same
//! PnP state machine. This crate implements that state machine and the
//! minor-function dispatch in front of it. Everything outside the state
//! machine is reached through the [`StackServices`] collaborator trait.
//!
//! # Example
//!
//! ```
//! use pnp::test_utils::RecordingServices;
//! use pnp::{DeviceNode, Dispatcher, LifecycleState, NodeId, NodeKind};
//! use pnp::{PnpError, PnpRequest, RequestSubtype, Status};
//!
//! let services = RecordingServices::new();
//! let dispatcher = Dispatcher::new(&services);
//! let port = DeviceNode::new(NodeId(6), NodeKind::PortVirtual, None).unwrap();
//!
//! dispatcher.dispatch(&port, &mut PnpRequest::new(RequestSubtype::Start));
//! assert_eq!(port.current_state(), LifecycleState::Started);
//!
//! // An outstanding interface reference keeps the port from being removed
//! let held = port.acquire_interface();
//! let status = dispatcher.dispatch(&port, &mut PnpRequest::new(RequestSubtype::QueryRemove));
//! assert_eq!(status, Status::Failed(PnpError::DeviceBusy));
//!
//! drop(held);
//! dispatcher.dispatch(&port, &mut PnpRequest::new(RequestSubtype::QueryRemove));
//! assert_eq!(port.current_state(), LifecycleState::RemovePending);
//! ```

pub mod dispatch;
pub mod error;
pub mod gate;
mod lifecycle;
pub mod node;
mod query;
pub mod request;
pub mod services;
pub mod test_utils;

pub use dispatch::{Dispatcher, dispatch};
pub use error::{NodeError, PnpError, Result, Status};
pub use gate::{InterfaceRef, RefGate};
pub use node::{DeviceNode, LifecycleState, NodeId, NodeKind};
pub use request::{
    BusInformation, DeviceStateFlags, DeviceTextType, GUID_BUS_TYPE_USB, Guid, IoStatus,
    LegacyBusType, Parameters, Payload, PnpRequest, RequestSubtype,
};
pub use services::{DeviceProperty, ResponsePool, StackServices, SystemPool};
