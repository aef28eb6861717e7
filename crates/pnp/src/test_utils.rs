//! Test doubles for the collaborator interfaces
//!
//! # Example
//!
//! ```
//! use pnp::test_utils::RecordingServices;
//! use pnp::{DeviceNode, Dispatcher, LifecycleState, NodeId, NodeKind, PnpRequest, RequestSubtype};
//!
//! let services = RecordingServices::new();
//! let hub = DeviceNode::new(NodeId(5), NodeKind::HubLogical, Some(NodeId(4))).unwrap();
//!
//! Dispatcher::new(&services).dispatch(&hub, &mut PnpRequest::new(RequestSubtype::Start));
//! assert_eq!(hub.current_state(), LifecycleState::Started);
//! assert_eq!(services.pass_down_count(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{PnpError, Status};
use crate::node::{DeviceNode, NodeId};
use crate::request::{BusInformation, PnpRequest};
use crate::services::{DeviceProperty, ResponsePool, StackServices};

#[derive(Debug, Default)]
struct Record {
    passed_down: Vec<(NodeId, u8)>,
    unplugged: Vec<NodeId>,
    starts: usize,
    stops: usize,
    removes: usize,
    start_failure: Option<PnpError>,
    properties: HashMap<DeviceProperty, String>,
    product: Option<String>,
}

/// [`StackServices`] that records every call
///
/// Pass-down completes the request with success, as an idle lower driver
/// would.
#[derive(Debug, Default)]
pub struct RecordingServices {
    record: Mutex<Record>,
}

impl RecordingServices {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self) -> std::sync::MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_property(&self, key: DeviceProperty, value: &str) {
        self.record().properties.insert(key, value.to_string());
    }

    pub fn set_product(&self, product: &str) {
        self.record().product = Some(product.to_string());
    }

    /// Make every following start negotiation fail with `err`
    pub fn fail_start(&self, err: PnpError) {
        self.record().start_failure = Some(err);
    }

    pub fn pass_down_count(&self) -> usize {
        self.record().passed_down.len()
    }

    /// `(node, ordinal)` of every request passed down, in order
    pub fn passed_down(&self) -> Vec<(NodeId, u8)> {
        self.record().passed_down.clone()
    }

    pub fn unplugged(&self) -> Vec<NodeId> {
        self.record().unplugged.clone()
    }

    pub fn start_count(&self) -> usize {
        self.record().starts
    }

    pub fn stop_count(&self) -> usize {
        self.record().stops
    }

    pub fn remove_count(&self) -> usize {
        self.record().removes
    }
}

impl StackServices for RecordingServices {
    fn pass_down(&self, node: &DeviceNode, request: &mut PnpRequest) -> Status {
        self.record()
            .passed_down
            .push((node.id(), request.ordinal()));
        request.io_status.status = Status::Success;
        Status::Success
    }

    fn negotiate_start(&self, _node: &DeviceNode) -> Status {
        let mut record = self.record();
        record.starts += 1;
        match record.start_failure {
            Some(err) => err.into(),
            None => Status::Success,
        }
    }

    fn negotiate_stop(&self, _node: &DeviceNode) -> Status {
        self.record().stops += 1;
        Status::Success
    }

    fn negotiate_remove(&self, _node: &DeviceNode) -> Status {
        self.record().removes += 1;
        Status::Success
    }

    fn unplug_port(&self, node: &DeviceNode) {
        self.record().unplugged.push(node.id());
    }

    fn device_property(&self, _node: &DeviceNode, key: DeviceProperty) -> Option<String> {
        self.record().properties.get(&key).cloned()
    }

    fn remote_product_string(&self, _node: &DeviceNode) -> Option<String> {
        self.record().product.clone()
    }
}

/// [`ResponsePool`] whose every allocation fails
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustedPool;

impl ResponsePool for ExhaustedPool {
    fn alloc_text(&self, _text: &str) -> Option<String> {
        None
    }

    fn alloc_bus_information(&self, _info: BusInformation) -> Option<Box<BusInformation>> {
        None
    }
}
