//! Scripted PnP request sequences
//!
//! A script is a TOML file of `[[step]]` tables replayed in order against a
//! [`VirtualStack`]:
//!
//! ```toml
//! [[step]]
//! action = "request"
//! node = "vhub"
//! request = "start"
//!
//! [[step]]
//! action = "acquire"
//! node = "port1"
//!
//! [[step]]
//! action = "request"
//! node = "port1"
//! request = "query-device-text"
//! text_type = 0
//! ```
//!
//! `request` takes a request name or a raw minor-function ordinal.

use common::{Error, Result};
use pnp::{DeviceTextType, LifecycleState, Payload, PnpRequest, RequestSubtype, Status};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::stack::VirtualStack;

/// Locale used when a device text step names none (en-US)
const DEFAULT_LOCALE: u32 = 0x409;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RequestSelector {
    Ordinal(u8),
    Name(String),
}

impl RequestSelector {
    fn ordinal(&self) -> Result<u8> {
        match self {
            RequestSelector::Ordinal(ordinal) => Ok(*ordinal),
            RequestSelector::Name(name) => name
                .parse::<RequestSubtype>()
                .map(RequestSubtype::ordinal)
                .map_err(Error::Script),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Request {
        node: String,
        request: RequestSelector,
        #[serde(default)]
        text_type: Option<u32>,
        #[serde(default)]
        locale: Option<u32>,
    },
    Acquire {
        node: String,
    },
    Release {
        node: String,
    },
}

/// Outcome of one replayed step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub node: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    pub state: LifecycleState,
    pub refs: usize,
}

impl std::fmt::Display for StepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>3}  {:<6} {:<30}", self.step, self.node, self.action)?;
        match self.status {
            Some(status) => write!(f, " {:<24}", status.to_string())?,
            None => write!(f, " {:<24}", "-")?,
        }
        write!(f, " {:?} refs={}", self.state, self.refs)?;
        match &self.payload {
            Some(Payload::Text(text)) => write!(f, "  \"{}\"", text),
            Some(Payload::BusInformation(info)) => {
                write!(f, "  bus {} #{}", info.bus_type, info.bus_number)
            }
            Some(Payload::DeviceState(flags)) => write!(f, "  flags {:#x}", flags.bits()),
            Some(Payload::Opaque(bytes)) => write!(f, "  {}", String::from_utf8_lossy(bytes)),
            None => Ok(()),
        }
    }
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Script(e.to_string()))
    }

    /// Replay every step, stopping at the first malformed one
    ///
    /// Failed PnP requests are reported, not treated as errors.
    pub fn run(&self, stack: &VirtualStack) -> Result<Vec<StepReport>> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| run_step(stack, i + 1, step))
            .collect()
    }
}

fn build_request(ordinal: u8, text_type: Option<u32>, locale: Option<u32>) -> PnpRequest {
    if ordinal != RequestSubtype::QueryDeviceText.ordinal() {
        return PnpRequest::from_ordinal(ordinal);
    }
    PnpRequest::device_text_raw(
        text_type.unwrap_or(DeviceTextType::Description.raw()),
        locale.unwrap_or(DEFAULT_LOCALE),
    )
}

fn run_step(stack: &VirtualStack, index: usize, step: &Step) -> Result<StepReport> {
    debug!("step {}: {:?}", index, step);

    let (node, action, status, payload) = match step {
        Step::Request {
            node,
            request,
            text_type,
            locale,
        } => {
            let id = stack.resolve(node)?;
            let ordinal = request.ordinal()?;
            let mut request = build_request(ordinal, *text_type, *locale);
            let status = stack.dispatch(id, &mut request)?;
            let action = match RequestSubtype::from_ordinal(ordinal) {
                Some(subtype) => subtype.to_string(),
                None => format!("{:#04x}", ordinal),
            };
            (id, action, Some(status), request.io_status.information)
        }
        Step::Acquire { node } => {
            let id = stack.resolve(node)?;
            stack.acquire(id)?;
            (id, "acquire".to_string(), None, None)
        }
        Step::Release { node } => {
            let id = stack.resolve(node)?;
            stack.release(id)?;
            (id, "release".to_string(), None, None)
        }
    };

    let target = stack.node(node)?;
    Ok(StepReport {
        step: index,
        node: stack.name_of(node),
        action,
        status,
        payload,
        state: target.current_state(),
        refs: target.external_ref_count(),
    })
}
