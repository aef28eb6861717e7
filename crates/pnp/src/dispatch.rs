//! PnP dispatch entry point and minor-function table

use tracing::{debug, warn};

use crate::error::{PnpError, Status};
use crate::lifecycle;
use crate::node::DeviceNode;
use crate::query;
use crate::request::{PnpRequest, RequestSubtype};
use crate::services::{ResponsePool, StackServices, SystemPool};

type Handler = fn(&Dispatcher<'_>, &DeviceNode, &mut PnpRequest) -> Status;

/// Handlers indexed by minor-function ordinal
static PNP_HANDLERS: [Handler; RequestSubtype::COUNT] = [
    lifecycle::start,
    lifecycle::query_remove,
    lifecycle::remove,
    lifecycle::cancel_remove,
    lifecycle::stop,
    lifecycle::query_stop,
    lifecycle::cancel_stop,
    query::deferred, // query-relations
    query::deferred, // query-interface
    query::deferred, // query-capabilities
    query::deferred, // query-resources
    query::deferred, // query-resource-requirements
    query::device_text,
    query::deferred, // filter-resource-requirements
    query::reserved, // 0x0E, undefined
    query::read_config,
    query::write_config,
    query::eject,
    query::set_lock,
    query::deferred, // query-id
    query::device_state,
    query::bus_information,
    query::usage_notification,
    lifecycle::surprise_removal,
    query::legacy_bus_information,
    query::device_enumerated,
];

static SYSTEM_POOL: SystemPool = SystemPool;

/// Routes PnP requests to their handlers
///
/// Requests are processed synchronously on the calling thread. The
/// surrounding stack guarantees at most one request in flight per node.
#[derive(Clone, Copy)]
pub struct Dispatcher<'a> {
    pub(crate) services: &'a dyn StackServices,
    pub(crate) pool: &'a dyn ResponsePool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(services: &'a dyn StackServices) -> Self {
        Self::with_pool(services, &SYSTEM_POOL)
    }

    pub fn with_pool(services: &'a dyn StackServices, pool: &'a dyn ResponsePool) -> Self {
        Self { services, pool }
    }

    /// Handle one PnP request for `node`
    ///
    /// A removed node fails every request with [`PnpError::NoSuchDevice`]
    /// and never forwards it. Ordinals outside the table are completed
    /// unmodified.
    pub fn dispatch(&self, node: &DeviceNode, request: &mut PnpRequest) -> Status {
        let ordinal = request.ordinal();
        debug!("{}: enter {}", node, describe(ordinal));

        let status = if node.is_removed() {
            request.complete(PnpError::NoSuchDevice.into())
        } else if let Some(handler) = PNP_HANDLERS.get(usize::from(ordinal)) {
            handler(self, node, request)
        } else {
            warn!("{}: unknown minor function {:#04x}", node, ordinal);
            request.complete_as_is()
        };

        debug!("{}: leave {}", node, status);
        status
    }

    /// Send the request down the stack, or complete it here with success
    pub(crate) fn forward_or_complete(&self, node: &DeviceNode, request: &mut PnpRequest) -> Status {
        match node.lower() {
            Some(_) => self.services.pass_down(node, request),
            None => request.complete(Status::Success),
        }
    }

    /// Send the request down the stack, or complete it here unmodified
    pub(crate) fn forward_or_complete_as_is(
        &self,
        node: &DeviceNode,
        request: &mut PnpRequest,
    ) -> Status {
        match node.lower() {
            Some(_) => self.services.pass_down(node, request),
            None => request.complete_as_is(),
        }
    }
}

/// Convenience wrapper around [`Dispatcher::dispatch`] using the system pool
pub fn dispatch(
    services: &dyn StackServices,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    Dispatcher::new(services).dispatch(node, request)
}

fn describe(ordinal: u8) -> String {
    match RequestSubtype::from_ordinal(ordinal) {
        Some(subtype) => subtype.to_string(),
        None => format!("{:#04x}", ordinal),
    }
}
