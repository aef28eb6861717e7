//! Lifecycle transition handlers
//!
//! Each handler updates the node's state and then either forwards the
//! request to the lower node or completes it locally, never both.

use tracing::{trace, warn};

use crate::dispatch::Dispatcher;
use crate::error::{PnpError, Status};
use crate::node::{DeviceNode, LifecycleState};
use crate::request::PnpRequest;

pub(crate) fn start(d: &Dispatcher<'_>, node: &DeviceNode, request: &mut PnpRequest) -> Status {
    trace!("{}", node);

    let status = d.services.negotiate_start(node);
    if !status.is_success() {
        warn!("{}: start negotiation failed, {}", node, status);
        return request.complete(status);
    }

    node.set_state(LifecycleState::Started);
    d.forward_or_complete(node, request)
}

pub(crate) fn query_stop(
    d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);

    node.set_state(LifecycleState::StopPending);
    d.forward_or_complete(node, request)
}

pub(crate) fn cancel_stop(
    d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);

    node.restore_previous_state(LifecycleState::StopPending);
    d.forward_or_complete(node, request)
}

pub(crate) fn stop(d: &Dispatcher<'_>, node: &DeviceNode, request: &mut PnpRequest) -> Status {
    trace!("{}", node);

    let status = d.services.negotiate_stop(node);
    if !status.is_success() {
        warn!("{}: stop negotiation failed, {}", node, status);
        return request.complete(status);
    }

    node.set_state(LifecycleState::Stopped);
    d.forward_or_complete(node, request)
}

pub(crate) fn query_remove(
    d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);

    if node.can_remove() {
        node.set_state(LifecycleState::RemovePending);
        d.forward_or_complete(node, request)
    } else {
        warn!(
            "{}: can't be removed, {} interface reference(s) outstanding",
            node,
            node.external_ref_count()
        );
        request.complete(PnpError::DeviceBusy.into())
    }
}

pub(crate) fn cancel_remove(
    d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);

    node.restore_previous_state(LifecycleState::RemovePending);
    d.forward_or_complete(node, request)
}

pub(crate) fn remove(d: &Dispatcher<'_>, node: &DeviceNode, request: &mut PnpRequest) -> Status {
    trace!("{}", node);

    let status = d.services.negotiate_remove(node);
    if !status.is_success() {
        warn!("{}: remove negotiation failed, {}", node, status);
        return request.complete(status);
    }

    node.set_state(LifecycleState::Removed);
    d.forward_or_complete(node, request)
}

pub(crate) fn surprise_removal(
    d: &Dispatcher<'_>,
    node: &DeviceNode,
    request: &mut PnpRequest,
) -> Status {
    trace!("{}", node);

    node.set_state(LifecycleState::SurpriseRemovePending);
    d.forward_or_complete(node, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeId, NodeKind};
    use crate::request::RequestSubtype;
    use crate::test_utils::RecordingServices;

    fn run(services: &RecordingServices, node: &DeviceNode, subtype: RequestSubtype) -> Status {
        Dispatcher::new(services).dispatch(node, &mut PnpRequest::new(subtype))
    }

    #[test]
    fn test_cancel_stop_without_pending_is_noop() {
        let services = RecordingServices::new();
        let node = DeviceNode::new(NodeId(4), NodeKind::HubPhysical, None).unwrap();

        run(&services, &node, RequestSubtype::Start);
        run(&services, &node, RequestSubtype::Stop);
        assert_eq!(
            run(&services, &node, RequestSubtype::CancelStop),
            Status::Success
        );
        assert_eq!(node.current_state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_cancel_remove_restores_previous_state() {
        let services = RecordingServices::new();
        let node = DeviceNode::new(NodeId(4), NodeKind::HubPhysical, None).unwrap();

        run(&services, &node, RequestSubtype::Start);
        run(&services, &node, RequestSubtype::QueryRemove);
        assert_eq!(node.current_state(), LifecycleState::RemovePending);

        run(&services, &node, RequestSubtype::CancelRemove);
        assert_eq!(node.current_state(), LifecycleState::Started);
    }

    #[test]
    fn test_failed_start_keeps_state() {
        let services = RecordingServices::new();
        services.fail_start(PnpError::Unsuccessful);
        let node = DeviceNode::new(NodeId(3), NodeKind::ControllerFunctional, Some(NodeId(2)))
            .unwrap();

        let status = run(&services, &node, RequestSubtype::Start);
        assert_eq!(status, Status::Failed(PnpError::Unsuccessful));
        assert_eq!(node.current_state(), LifecycleState::Created);
        assert_eq!(services.pass_down_count(), 0);
    }

    #[test]
    fn test_surprise_removal_then_remove() {
        let services = RecordingServices::new();
        let node = DeviceNode::new(NodeId(6), NodeKind::PortVirtual, None).unwrap();

        run(&services, &node, RequestSubtype::Start);
        run(&services, &node, RequestSubtype::SurpriseRemove);
        assert_eq!(node.current_state(), LifecycleState::SurpriseRemovePending);

        run(&services, &node, RequestSubtype::Remove);
        assert_eq!(node.current_state(), LifecycleState::Removed);
        assert_eq!(services.remove_count(), 1);
    }
}
