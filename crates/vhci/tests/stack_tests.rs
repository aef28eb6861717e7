//! Integration tests for the simulated device stack
//!
//! Replays full PnP sequences through the dispatch entry point with every
//! collaborator backed by the simulator:
//! - Bring-up and orderly teardown of the whole stack
//! - Removal refused while interface references are held
//! - Eject of a virtual port
//! - Device text from the configured property store
//! - Script reports

use pnp::{
    DeviceTextType, LifecycleState, NodeKind, Payload, PnpError, PnpRequest, RequestSubtype,
    Status,
};
use vhci::stack::{CONTROLLER_FUNCTIONAL, CONTROLLER_PHYSICAL, HUB_LOGICAL, HUB_PHYSICAL, ROOT};
use vhci::stack::port_id;
use vhci::{Script, VhciConfig, VirtualStack};

const CONFIG: &str = r#"
[simulator]
log_level = "info"

[hub]
ports = 4

[[ports]]
port = 1
product = "Remote Flash Drive"

[[ports]]
port = 2
description = "Kingston DataTraveler"
product = "DataTraveler 3.0"

[[ports]]
port = 3

[properties]
hub_logical = "Virtual USB Hub"
"#;

fn make_stack() -> VirtualStack {
    VirtualStack::from_config(&VhciConfig::parse(CONFIG).unwrap()).unwrap()
}

fn send(stack: &VirtualStack, id: pnp::NodeId, subtype: RequestSubtype) -> Status {
    stack.dispatch(id, &mut PnpRequest::new(subtype)).unwrap()
}

fn state(stack: &VirtualStack, id: pnp::NodeId) -> LifecycleState {
    stack.node(id).unwrap().current_state()
}

fn description(stack: &VirtualStack, id: pnp::NodeId) -> Option<Payload> {
    let mut request = PnpRequest::device_text(DeviceTextType::Description, 0x409);
    stack.dispatch(id, &mut request).unwrap();
    request.io_status.information
}

mod lifecycle {
    use super::*;

    #[test]
    fn test_bring_up_and_teardown() {
        let stack = make_stack();
        let functional = [ROOT, CONTROLLER_FUNCTIONAL, HUB_LOGICAL];

        for id in functional {
            assert_eq!(send(&stack, id, RequestSubtype::Start), Status::Success);
        }
        for port in 1..=3 {
            assert_eq!(send(&stack, port_id(port), RequestSubtype::Start), Status::Success);
        }
        assert!(stack.nodes().all(|n| n.current_state() == LifecycleState::Started));

        for port in 1..=3 {
            send(&stack, port_id(port), RequestSubtype::QueryRemove);
            send(&stack, port_id(port), RequestSubtype::Remove);
        }
        for id in functional.into_iter().rev() {
            assert_eq!(send(&stack, id, RequestSubtype::QueryRemove), Status::Success);
            assert_eq!(send(&stack, id, RequestSubtype::Remove), Status::Success);
        }
        assert!(stack.nodes().all(|n| n.is_removed()));
    }

    #[test]
    fn test_query_stop_cancel_on_controller() {
        let stack = make_stack();
        send(&stack, CONTROLLER_FUNCTIONAL, RequestSubtype::Start);

        send(&stack, CONTROLLER_FUNCTIONAL, RequestSubtype::QueryStop);
        assert_eq!(state(&stack, CONTROLLER_FUNCTIONAL), LifecycleState::StopPending);
        assert_eq!(state(&stack, CONTROLLER_PHYSICAL), LifecycleState::StopPending);

        send(&stack, CONTROLLER_FUNCTIONAL, RequestSubtype::CancelStop);
        assert_eq!(state(&stack, CONTROLLER_FUNCTIONAL), LifecycleState::Started);
        assert_eq!(state(&stack, CONTROLLER_PHYSICAL), LifecycleState::Started);
    }

    #[test]
    fn test_busy_physical_hub_refuses_removal_of_stack() {
        let stack = make_stack();
        send(&stack, HUB_LOGICAL, RequestSubtype::Start);
        let _held = stack.acquire(HUB_PHYSICAL).unwrap();

        // The functional hub moves to RemovePending before passing down;
        // the physical hub below it refuses
        let status = send(&stack, HUB_LOGICAL, RequestSubtype::QueryRemove);
        assert_eq!(status, Status::Failed(PnpError::DeviceBusy));
        assert_eq!(state(&stack, HUB_PHYSICAL), LifecycleState::Started);

        send(&stack, HUB_LOGICAL, RequestSubtype::CancelRemove);
        assert_eq!(state(&stack, HUB_LOGICAL), LifecycleState::Started);
    }

    #[test]
    fn test_removed_port_is_inert() {
        let stack = make_stack();
        let port = port_id(1);
        send(&stack, port, RequestSubtype::Start);
        send(&stack, port, RequestSubtype::SurpriseRemove);
        send(&stack, port, RequestSubtype::Remove);

        for subtype in RequestSubtype::ALL {
            assert_eq!(
                send(&stack, port, subtype),
                Status::Failed(PnpError::NoSuchDevice)
            );
        }
        assert_eq!(stack.unplug_count(port), 0);
        assert!(!stack.is_plugged(port));
    }
}

mod ports {
    use super::*;

    #[test]
    fn test_eject_unplugs_only_ports() {
        let stack = make_stack();

        assert_eq!(send(&stack, port_id(1), RequestSubtype::Eject), Status::Success);
        assert_eq!(stack.unplug_count(port_id(1)), 1);
        assert!(!stack.is_plugged(port_id(1)));

        assert_eq!(send(&stack, HUB_LOGICAL, RequestSubtype::Eject), Status::NotSupported);
        assert!(stack.is_plugged(port_id(2)));
    }

    #[test]
    fn test_port_descriptions() {
        let stack = make_stack();

        assert_eq!(
            description(&stack, port_id(1)),
            Some(Payload::Text("Remote Flash Drive".to_string()))
        );
        assert_eq!(
            description(&stack, port_id(2)),
            Some(Payload::Text("Kingston DataTraveler".to_string()))
        );
        assert_eq!(
            description(&stack, port_id(3)),
            Some(Payload::Text(NodeKind::PortVirtual.default_description().to_string()))
        );
    }

    #[test]
    fn test_unplugged_port_loses_product_string() {
        let stack = make_stack();
        send(&stack, port_id(1), RequestSubtype::Eject);

        assert_eq!(
            description(&stack, port_id(1)),
            Some(Payload::Text("usbip-win VPDO".to_string()))
        );
    }

    #[test]
    fn test_port_location() {
        let stack = make_stack();
        let mut request = PnpRequest::device_text(DeviceTextType::LocationInformation, 0x409);
        let status = stack.dispatch(port_id(3), &mut request).unwrap();

        assert_eq!(status, Status::Success);
        assert_eq!(
            request.information(),
            Some(&Payload::Text("Port_#0003.Hub_#0001".to_string()))
        );
    }

    #[test]
    fn test_hub_description_from_properties() {
        let stack = make_stack();
        assert_eq!(
            description(&stack, HUB_LOGICAL),
            Some(Payload::Text("Virtual USB Hub".to_string()))
        );
        assert_eq!(
            description(&stack, ROOT),
            Some(Payload::Text("usbip-win ROOT".to_string()))
        );
    }

    #[test]
    fn test_query_id_answered_by_physical_nodes() {
        let stack = make_stack();
        let mut request = PnpRequest::new(RequestSubtype::QueryId);
        assert_eq!(stack.dispatch(port_id(1), &mut request).unwrap(), Status::Success);
        assert_eq!(
            request.information(),
            Some(&Payload::Opaque(b"USBIP\\VPDO".to_vec()))
        );

        // The functional hub passes it to its physical object
        let mut request = PnpRequest::new(RequestSubtype::QueryId);
        assert_eq!(stack.dispatch(HUB_LOGICAL, &mut request).unwrap(), Status::Success);
        assert_eq!(
            request.information(),
            Some(&Payload::Opaque(b"USBIP\\HPDO".to_vec()))
        );
    }
}

mod scripts {
    use super::*;

    const SCRIPT: &str = r#"
[[step]]
action = "request"
node = "port1"
request = "start"

[[step]]
action = "acquire"
node = "port1"

[[step]]
action = "request"
node = "port1"
request = "query-remove"

[[step]]
action = "release"
node = "port1"

[[step]]
action = "request"
node = "port1"
request = "query-remove"

[[step]]
action = "request"
node = "port1"
request = 99

[[step]]
action = "request"
node = "port1"
request = "query-bus-information"
"#;

    #[test]
    fn test_script_reports() {
        let stack = make_stack();
        let reports = Script::parse(SCRIPT).unwrap().run(&stack).unwrap();

        assert_eq!(reports.len(), 7);
        assert_eq!(reports[2].status, Some(Status::Failed(PnpError::DeviceBusy)));
        assert_eq!(reports[2].state, LifecycleState::Started);
        assert_eq!(reports[4].state, LifecycleState::RemovePending);
        assert_eq!(reports[5].action, "0x63");
        assert_eq!(reports[5].status, Some(Status::NotSupported));
        assert_eq!(reports[5].state, LifecycleState::RemovePending);
        assert!(matches!(reports[6].payload, Some(Payload::BusInformation(_))));
    }

    #[test]
    fn test_reports_serialize_to_json() {
        let stack = make_stack();
        let reports = Script::parse(SCRIPT).unwrap().run(&stack).unwrap();

        let json = serde_json::to_value(&reports).unwrap();
        assert_eq!(json[2]["status"]["failed"], "device_busy");
        assert_eq!(json[4]["state"], "remove_pending");
        assert_eq!(json[0]["node"], "port1");
        assert!(json[1].get("status").is_none());

        let bus = &json[6]["payload"]["bus_information"];
        assert_eq!(bus["bus_type"], "{9d7debbc-c85d-11d1-9eb4-006008c3a19a}");
        assert_eq!(bus["legacy_bus_type"], "pnp_bus");
        assert_eq!(bus["bus_number"], 1);
    }

    #[test]
    fn test_script_aborts_on_unknown_node() {
        let stack = make_stack();
        let script = Script::parse(
            "[[step]]\naction = \"request\"\nnode = \"port4\"\nrequest = \"start\"\n",
        )
        .unwrap();
        assert!(script.run(&stack).is_err());
    }
}
