//! Simulator configuration management

use anyhow::{Context, Result, anyhow};
use pnp::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One remote device plugged into the virtual hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Hub port number, 1-based
    pub port: u8,
    /// Product string reported by the remote device
    #[serde(default)]
    pub product: Option<String>,
    /// Device description stored in the property store
    #[serde(default)]
    pub description: Option<String>,
    /// Location information stored in the property store
    ///
    /// Defaults to `Port_#NNNN.Hub_#0001`.
    #[serde(default)]
    pub location: Option<String>,
}

impl PortConfig {
    pub fn location(&self) -> String {
        self.location
            .clone()
            .unwrap_or_else(|| format!("Port_#{:04}.Hub_#0001", self.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VhciConfig {
    pub simulator: SimulatorSettings,
    #[serde(default)]
    pub hub: HubSettings,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub properties: PropertySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorSettings {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    /// Number of downstream ports on the virtual hub
    pub ports: u8,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self { ports: 8 }
    }
}

/// Device descriptions held in the property store, per node kind
///
/// Virtual ports take theirs from [`PortConfig::description`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySettings {
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub controller_physical: Option<String>,
    #[serde(default)]
    pub controller_functional: Option<String>,
    #[serde(default)]
    pub hub_physical: Option<String>,
    #[serde(default)]
    pub hub_logical: Option<String>,
}

impl PropertySettings {
    pub fn description(&self, kind: NodeKind) -> Option<&str> {
        match kind {
            NodeKind::Root => self.root.as_deref(),
            NodeKind::ControllerPhysical => self.controller_physical.as_deref(),
            NodeKind::ControllerFunctional => self.controller_functional.as_deref(),
            NodeKind::HubPhysical => self.hub_physical.as_deref(),
            NodeKind::HubLogical => self.hub_logical.as_deref(),
            NodeKind::PortVirtual => None,
        }
    }
}

impl Default for VhciConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorSettings {
                log_level: "info".to_string(),
            },
            hub: HubSettings::default(),
            ports: vec![PortConfig {
                port: 1,
                product: Some("Remote USB Device".to_string()),
                description: None,
                location: None,
            }],
            properties: PropertySettings::default(),
        }
    }
}

impl VhciConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref())
        } else {
            let candidates = vec![Self::default_path(), PathBuf::from("/etc/usbip-vhci/vhci.toml")];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        tracing::debug!(
            "Config: hub with {} ports, {} attached",
            config.hub.ports,
            config.ports.len()
        );
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: VhciConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                // Logging is not initialized yet
                eprintln!("Config: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usbip-vhci").join("vhci.toml")
        } else {
            PathBuf::from(".config/usbip-vhci/vhci.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !common::LOG_LEVELS.contains(&self.simulator.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.simulator.log_level,
                common::LOG_LEVELS.join(", ")
            ));
        }

        if self.hub.ports == 0 {
            return Err(anyhow!("Hub must have at least one port"));
        }

        let mut seen = HashSet::new();
        for port in &self.ports {
            if port.port == 0 || port.port > self.hub.ports {
                return Err(anyhow!(
                    "Port {} out of range, hub has ports 1..={}",
                    port.port,
                    self.hub.ports
                ));
            }
            if !seen.insert(port.port) {
                return Err(anyhow!("Port {} configured more than once", port.port));
            }
        }

        Ok(())
    }
}
