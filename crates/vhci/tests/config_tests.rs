//! Integration tests for configuration and script files
//!
//! Tests:
//! - Loading full and minimal configurations from disk
//! - Save/load of the default configuration
//! - Rejection of invalid configurations
//! - Loading scripts from disk

use std::fs;
use tempfile::tempdir;
use vhci::{Script, Step, VhciConfig};

const FULL_CONFIG: &str = r#"
[simulator]
log_level = "debug"

[hub]
ports = 4

[[ports]]
port = 1
product = "Remote Flash Drive"
description = "Kingston DataTraveler"

[[ports]]
port = 4
product = "Remote Keyboard"
location = "Front panel"

[properties]
root = "USB/IP Enumerator"
hub_logical = "Virtual USB Hub"
"#;

mod config_files {
    use super::*;

    #[test]
    fn test_load_full_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vhci.toml");
        fs::write(&path, FULL_CONFIG).unwrap();

        let config = VhciConfig::load(Some(path)).unwrap();
        assert_eq!(config.simulator.log_level, "debug");
        assert_eq!(config.hub.ports, 4);
        assert_eq!(config.ports.len(), 2);
        assert_eq!(config.ports[0].description.as_deref(), Some("Kingston DataTraveler"));
        assert_eq!(config.ports[1].location(), "Front panel");
        assert_eq!(config.properties.root.as_deref(), Some("USB/IP Enumerator"));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = VhciConfig::parse("[simulator]\nlog_level = \"info\"\n").unwrap();
        assert_eq!(config.hub.ports, 8);
        assert!(config.ports.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("vhci.toml");

        VhciConfig::default().save(&path).unwrap();
        let loaded = VhciConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.ports, VhciConfig::default().ports);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(VhciConfig::load(Some(dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let cases = [
            "[simulator]\nlog_level = \"loud\"\n",
            "[simulator]\nlog_level = \"info\"\n[hub]\nports = 0\n",
            "[simulator]\nlog_level = \"info\"\n[hub]\nports = 2\n[[ports]]\nport = 5\n",
            "[simulator]\nlog_level = \"info\"\n[[ports]]\nport = 1\n[[ports]]\nport = 1\n",
            "[hub]\nports = 2\n",
        ];
        for case in cases {
            assert!(VhciConfig::parse(case).is_err(), "accepted: {}", case);
        }
    }

    #[test]
    fn test_default_path_location() {
        let path = VhciConfig::default_path();
        assert!(path.ends_with("usbip-vhci/vhci.toml"));
    }
}

mod script_files {
    use super::*;

    #[test]
    fn test_load_script() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eject.toml");
        fs::write(
            &path,
            r#"
[[step]]
action = "request"
node = "port1"
request = "start"

[[step]]
action = "request"
node = "port1"
request = "eject"

[[step]]
action = "release"
node = "port1"
"#,
        )
        .unwrap();

        let script = Script::load(&path).unwrap();
        assert_eq!(script.steps.len(), 3);
        assert!(matches!(script.steps[2], Step::Release { .. }));
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(Script::parse("[[step]]\naction = \"reboot\"\nnode = \"root\"\n").is_err());
    }

    #[test]
    fn test_empty_script() {
        assert!(Script::parse("").unwrap().steps.is_empty());
    }
}
