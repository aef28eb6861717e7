//! PnP request types
//!
//! A [`PnpRequest`] is the unit of work handed to [`crate::dispatch`]: a
//! minor-function ordinal, its parameters, and the I/O status block that the
//! handlers fill in on the way back up.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::Status;

/// PnP request kinds, numbered by their minor-function ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum RequestSubtype {
    Start = 0x00,
    QueryRemove = 0x01,
    Remove = 0x02,
    CancelRemove = 0x03,
    Stop = 0x04,
    QueryStop = 0x05,
    CancelStop = 0x06,
    QueryRelations = 0x07,
    QueryInterface = 0x08,
    QueryCapabilities = 0x09,
    QueryResources = 0x0A,
    QueryResourceRequirements = 0x0B,
    QueryDeviceText = 0x0C,
    FilterResourceRequirements = 0x0D,
    /// Undefined minor function, always passed through
    Reserved = 0x0E,
    ReadConfig = 0x0F,
    WriteConfig = 0x10,
    Eject = 0x11,
    SetLock = 0x12,
    QueryId = 0x13,
    QueryDeviceState = 0x14,
    QueryBusInformation = 0x15,
    DeviceUsageNotification = 0x16,
    SurpriseRemove = 0x17,
    QueryLegacyBusInformation = 0x18,
    DeviceEnumerated = 0x19,
}

impl RequestSubtype {
    pub const COUNT: usize = 26;

    pub const ALL: [RequestSubtype; RequestSubtype::COUNT] = [
        RequestSubtype::Start,
        RequestSubtype::QueryRemove,
        RequestSubtype::Remove,
        RequestSubtype::CancelRemove,
        RequestSubtype::Stop,
        RequestSubtype::QueryStop,
        RequestSubtype::CancelStop,
        RequestSubtype::QueryRelations,
        RequestSubtype::QueryInterface,
        RequestSubtype::QueryCapabilities,
        RequestSubtype::QueryResources,
        RequestSubtype::QueryResourceRequirements,
        RequestSubtype::QueryDeviceText,
        RequestSubtype::FilterResourceRequirements,
        RequestSubtype::Reserved,
        RequestSubtype::ReadConfig,
        RequestSubtype::WriteConfig,
        RequestSubtype::Eject,
        RequestSubtype::SetLock,
        RequestSubtype::QueryId,
        RequestSubtype::QueryDeviceState,
        RequestSubtype::QueryBusInformation,
        RequestSubtype::DeviceUsageNotification,
        RequestSubtype::SurpriseRemove,
        RequestSubtype::QueryLegacyBusInformation,
        RequestSubtype::DeviceEnumerated,
    ];

    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            RequestSubtype::Start => "start",
            RequestSubtype::QueryRemove => "query-remove",
            RequestSubtype::Remove => "remove",
            RequestSubtype::CancelRemove => "cancel-remove",
            RequestSubtype::Stop => "stop",
            RequestSubtype::QueryStop => "query-stop",
            RequestSubtype::CancelStop => "cancel-stop",
            RequestSubtype::QueryRelations => "query-relations",
            RequestSubtype::QueryInterface => "query-interface",
            RequestSubtype::QueryCapabilities => "query-capabilities",
            RequestSubtype::QueryResources => "query-resources",
            RequestSubtype::QueryResourceRequirements => "query-resource-requirements",
            RequestSubtype::QueryDeviceText => "query-device-text",
            RequestSubtype::FilterResourceRequirements => "filter-resource-requirements",
            RequestSubtype::Reserved => "reserved",
            RequestSubtype::ReadConfig => "read-config",
            RequestSubtype::WriteConfig => "write-config",
            RequestSubtype::Eject => "eject",
            RequestSubtype::SetLock => "set-lock",
            RequestSubtype::QueryId => "query-id",
            RequestSubtype::QueryDeviceState => "query-device-state",
            RequestSubtype::QueryBusInformation => "query-bus-information",
            RequestSubtype::DeviceUsageNotification => "device-usage-notification",
            RequestSubtype::SurpriseRemove => "surprise-remove",
            RequestSubtype::QueryLegacyBusInformation => "query-legacy-bus-information",
            RequestSubtype::DeviceEnumerated => "device-enumerated",
        }
    }
}

impl std::fmt::Display for RequestSubtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RequestSubtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown PnP request '{}'", s))
    }
}

/// Which string a Query-Device-Text request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceTextType {
    Description,
    LocationInformation,
}

impl DeviceTextType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(DeviceTextType::Description),
            1 => Some(DeviceTextType::LocationInformation),
            _ => None,
        }
    }

    pub const fn raw(self) -> u32 {
        match self {
            DeviceTextType::Description => 0,
            DeviceTextType::LocationInformation => 1,
        }
    }
}

/// Request-specific parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Parameters {
    #[default]
    None,
    /// Raw text type as received; validated by the handler
    DeviceText { text_type: u32, locale_id: u32 },
}

/// 128-bit GUID
///
/// Serialized in registry format, `{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Guid(pub u128);

/// Bus-type GUID of USB buses
pub const GUID_BUS_TYPE_USB: Guid = Guid(0x9d7debbc_c85d_11d1_9eb4_006008c3a19a);

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;
        write!(
            f,
            "{{{:08x}-{:04x}-{:04x}-{:04x}-{:012x}}}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}

impl std::str::FromStr for Guid {
    type Err = String;

    /// Parses registry format, braces optional
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(s);

        let groups: Vec<&str> = inner.split('-').collect();
        let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        let hex = groups
            .iter()
            .all(|g| g.bytes().all(|b| b.is_ascii_hexdigit()));
        if lengths != [8, 4, 4, 4, 12] || !hex {
            return Err(format!("malformed GUID '{}'", s));
        }

        u128::from_str_radix(&groups.concat(), 16)
            .map(Guid)
            .map_err(|e| format!("malformed GUID '{}': {}", s, e))
    }
}

impl From<Guid> for String {
    fn from(guid: Guid) -> Self {
        guid.to_string()
    }
}

impl TryFrom<String> for Guid {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Legacy interface type reported in bus information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum LegacyBusType {
    PnpBus = 15,
}

/// Payload of a Query-Bus-Information response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusInformation {
    pub bus_type: Guid,
    pub legacy_bus_type: LegacyBusType,
    pub bus_number: u32,
}

impl BusInformation {
    /// Descriptor every node of the virtual controller reports
    pub const USB: BusInformation = BusInformation {
        bus_type: GUID_BUS_TYPE_USB,
        legacy_bus_type: LegacyBusType::PnpBus,
        bus_number: 1, // arbitrary
    };
}

bitflags! {
    /// Flags returned by Query-Device-State
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DeviceStateFlags: u32 {
        const DISABLED = 0x0000_0001;
        const DONT_DISPLAY_IN_UI = 0x0000_0002;
        const FAILED = 0x0000_0004;
        const REMOVED = 0x0000_0008;
        const RESOURCE_REQUIREMENTS_CHANGED = 0x0000_0010;
        const NOT_DISABLEABLE = 0x0000_0020;
    }
}

/// Information attached to a completed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Text(String),
    BusInformation(Box<BusInformation>),
    DeviceState(DeviceStateFlags),
    /// Answer produced by a collaborator for a deferred query
    Opaque(Vec<u8>),
}

/// Status block filled in while the request travels the stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoStatus {
    pub status: Status,
    pub information: Option<Payload>,
}

/// An inbound PnP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PnpRequest {
    ordinal: u8,
    pub parameters: Parameters,
    pub io_status: IoStatus,
}

impl PnpRequest {
    /// Build a request for a raw ordinal, including ones outside the table
    pub fn from_ordinal(ordinal: u8) -> Self {
        Self {
            ordinal,
            parameters: Parameters::None,
            io_status: IoStatus::default(),
        }
    }

    pub fn new(subtype: RequestSubtype) -> Self {
        Self::from_ordinal(subtype.ordinal())
    }

    pub fn device_text(text_type: DeviceTextType, locale_id: u32) -> Self {
        Self::device_text_raw(text_type.raw(), locale_id)
    }

    pub fn device_text_raw(text_type: u32, locale_id: u32) -> Self {
        Self {
            parameters: Parameters::DeviceText {
                text_type,
                locale_id,
            },
            ..Self::new(RequestSubtype::QueryDeviceText)
        }
    }

    pub fn ordinal(&self) -> u8 {
        self.ordinal
    }

    pub fn subtype(&self) -> Option<RequestSubtype> {
        RequestSubtype::from_ordinal(self.ordinal)
    }

    pub fn status(&self) -> Status {
        self.io_status.status
    }

    pub fn information(&self) -> Option<&Payload> {
        self.io_status.information.as_ref()
    }

    /// Complete with `status`, keeping whatever information is attached
    pub(crate) fn complete(&mut self, status: Status) -> Status {
        self.io_status.status = status;
        status
    }

    /// Complete without touching the status block
    pub(crate) fn complete_as_is(&self) -> Status {
        self.io_status.status
    }
}
