//! Auxiliary query handlers
//!
//! None of these changes the node's lifecycle state.

use tracing::{debug, error, trace};

use crate::dispatch::Dispatcher;
use crate::error::{PnpError, Status};
use crate::node::{DeviceNode, NodeKind};
use crate::request::{
    BusInformation, DeviceStateFlags, DeviceTextType, Parameters, Payload, PnpRequest,
};
use crate::services::DeviceProperty;

/// Relations, interfaces, capabilities, resources and ids are answered by
/// the stack services
pub(crate) fn deferred(d: &Dispatcher<'_>, node: &DeviceNode, request: &mut PnpRequest) -> Status {
    trace!("{}: minor {:#04x}", node, request.ordinal());

    d.services.answer_query(node, request);
    d.forward_or_complete_as_is(node, request)
}

/// Resolves the requested string from the property store, then the remote
/// product string (virtual ports only), then the per-kind default
pub(crate) fn device_text(
    d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    let (raw, locale_id) = match request.parameters {
        Parameters::DeviceText {
            text_type,
            locale_id,
        } => (text_type, locale_id),
        Parameters::None => (u32::MAX, 0),
    };

    let Some(text_type) = DeviceTextType::from_raw(raw) else {
        error!(
            "{}: unknown device text type {}, locale {:#x}",
            node, raw, locale_id
        );
        return request.complete(PnpError::InvalidParameter.into());
    };

    let (property, default) = match text_type {
        DeviceTextType::Description => (
            DeviceProperty::DeviceDescription,
            Some(node.kind().default_description()),
        ),
        DeviceTextType::LocationInformation => (DeviceProperty::LocationInformation, None),
    };

    let text = d
        .services
        .device_property(node, property)
        .or_else(|| product_text(d, node, text_type))
        .or_else(|| default.and_then(|s| d.pool.alloc_text(s)));

    if let Some(text) = text {
        request.io_status.information = Some(Payload::Text(text));
        request.io_status.status = Status::Success;
    }

    debug!(
        "{}: {:?}, locale {:#x} -> {:?}, {}",
        node,
        text_type,
        locale_id,
        request.information(),
        request.status()
    );
    request.complete_as_is()
}

fn product_text(d: &Dispatcher<'_>, node: &DeviceNode, text_type: DeviceTextType) -> Option<String> {
    if text_type != DeviceTextType::Description {
        return None;
    }

    match node.kind() {
        NodeKind::PortVirtual => d
            .services
            .remote_product_string(node)
            .and_then(|product| d.pool.alloc_text(&product)),
        NodeKind::Root
        | NodeKind::ControllerPhysical
        | NodeKind::ControllerFunctional
        | NodeKind::HubPhysical
        | NodeKind::HubLogical => None,
    }
}

pub(crate) fn bus_information(
    d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);

    match d.pool.alloc_bus_information(BusInformation::USB) {
        Some(info) => {
            request.io_status.information = Some(Payload::BusInformation(info));
            request.complete(Status::Success)
        }
        None => {
            request.io_status.information = None;
            request.complete(PnpError::InsufficientResources.into())
        }
    }
}

/// Removal of a virtual port is requested through its hub; other kinds
/// pass the request through
pub(crate) fn eject(d: &Dispatcher<'_>, node: &DeviceNode, request: &mut PnpRequest) -> Status {
    trace!("{}", node);

    match node.kind() {
        NodeKind::PortVirtual => {
            d.services.unplug_port(node);
            request.complete(Status::Success)
        }
        NodeKind::Root
        | NodeKind::ControllerPhysical
        | NodeKind::ControllerFunctional
        | NodeKind::HubPhysical
        | NodeKind::HubLogical => request.complete_as_is(),
    }
}

pub(crate) fn device_state(
    _d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    let mut flags = match request.information() {
        Some(Payload::DeviceState(flags)) => *flags,
        _ => DeviceStateFlags::empty(),
    };

    if node.is_removed() {
        flags |= DeviceStateFlags::REMOVED;
    }

    trace!("{}: {:#x}", node, flags.bits());
    request.io_status.information = Some(Payload::DeviceState(flags));
    request.complete(Status::Success)
}

pub(crate) fn usage_notification(
    d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);

    if let Some(info) = request.information() {
        debug!("{}: usage notification carries {:?}", node, info);
    }

    d.forward_or_complete(node, request)
}

pub(crate) fn device_enumerated(
    _d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);
    request.complete(Status::Success)
}

pub(crate) fn legacy_bus_information(
    _d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);
    request.complete_as_is()
}

pub(crate) fn read_config(
    _d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);
    request.complete_as_is()
}

pub(crate) fn write_config(
    _d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);
    request.complete_as_is()
}

pub(crate) fn set_lock(_d: &Dispatcher<'_>, node: &DeviceNode, request: &mut PnpRequest) -> Status {
    trace!("{}", node);
    request.complete_as_is()
}

pub(crate) fn reserved(_d: &Dispatcher<'_>, node: &DeviceNode, request: &mut PnpRequest) -> Status {
    trace!("{}", node);
    request.complete_as_is()
}
