use super::{
    AttributeSchema, ClusterCommand, ClusterResponse, FieldKind, FieldSpec, FromDecoded,
    LEGACY_STATUS, ResponseSchema, STATUS_TEXT_FIELDS, StatusTextResponse, encode_breadcrumb,
    optional_list, optional_text,
};
use crate::dispatch::{DecodedValue, ResponseFields};
use crate::tlv::{ListAttribute, TlvError, TlvTag, TlvWriter};

/// Matter Cluster ID for Network Commissioning
pub const CLUSTER_ID: u32 = 0x0031;

/// Request command IDs
pub mod commands {
    pub const SCAN_NETWORKS: u32 = 0x00;
    pub const ADD_WIFI_NETWORK: u32 = 0x02;
    pub const UPDATE_WIFI_NETWORK: u32 = 0x04;
    pub const ADD_THREAD_NETWORK: u32 = 0x06;
    pub const UPDATE_THREAD_NETWORK: u32 = 0x08;
    pub const REMOVE_NETWORK: u32 = 0x0A;
    pub const ENABLE_NETWORK: u32 = 0x0C;
    pub const DISABLE_NETWORK: u32 = 0x0E;
}

/// Response command IDs
pub mod response_commands {
    pub const SCAN_NETWORKS_RESPONSE: u32 = 0x01;
    pub const ADD_WIFI_NETWORK_RESPONSE: u32 = 0x03;
    pub const UPDATE_WIFI_NETWORK_RESPONSE: u32 = 0x05;
    pub const ADD_THREAD_NETWORK_RESPONSE: u32 = 0x07;
    pub const UPDATE_THREAD_NETWORK_RESPONSE: u32 = 0x09;
    pub const REMOVE_NETWORK_RESPONSE: u32 = 0x0B;
    pub const ENABLE_NETWORK_RESPONSE: u32 = 0x0D;
    pub const DISABLE_NETWORK_RESPONSE: u32 = 0x0F;
}

const WIFI_SCAN_RESULT_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(0, "security", FieldKind::Unsigned),
    FieldSpec::required(1, "ssid", FieldKind::Bytes),
    FieldSpec::required(2, "bssid", FieldKind::Bytes),
    FieldSpec::required(3, "channel", FieldKind::Unsigned),
    FieldSpec::required(4, "frequencyBand", FieldKind::Unsigned),
];

const THREAD_SCAN_RESULT_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(0, "panId", FieldKind::Unsigned),
    FieldSpec::required(1, "extendedPanId", FieldKind::Unsigned),
    FieldSpec::required(2, "networkName", FieldKind::Utf8),
    FieldSpec::required(3, "channel", FieldKind::Unsigned),
    FieldSpec::required(4, "version", FieldKind::Unsigned),
    FieldSpec::required(5, "extendedAddress", FieldKind::Bytes),
    FieldSpec::required(6, "rssi", FieldKind::Signed),
    FieldSpec::required(7, "lqi", FieldKind::Unsigned),
];

pub static SCAN_NETWORKS_RESPONSE: ResponseSchema = ResponseSchema {
    name: "ScanNetworksResponse",
    fields: &[
        FieldSpec::required(0, "errorCode", FieldKind::Unsigned),
        FieldSpec::optional(1, "debugText", FieldKind::Utf8),
        FieldSpec::optional(
            2,
            "wifiScanResults",
            FieldKind::List(&FieldKind::Struct(WIFI_SCAN_RESULT_FIELDS)),
        ),
        FieldSpec::optional(
            3,
            "threadScanResults",
            FieldKind::List(&FieldKind::Struct(THREAD_SCAN_RESULT_FIELDS)),
        ),
    ],
    status: LEGACY_STATUS,
};

pub static ADD_WIFI_NETWORK_RESPONSE: ResponseSchema = ResponseSchema {
    name: "AddWiFiNetworkResponse",
    fields: STATUS_TEXT_FIELDS,
    status: LEGACY_STATUS,
};

pub static UPDATE_WIFI_NETWORK_RESPONSE: ResponseSchema = ResponseSchema {
    name: "UpdateWiFiNetworkResponse",
    fields: STATUS_TEXT_FIELDS,
    status: LEGACY_STATUS,
};

pub static ADD_THREAD_NETWORK_RESPONSE: ResponseSchema = ResponseSchema {
    name: "AddThreadNetworkResponse",
    fields: STATUS_TEXT_FIELDS,
    status: LEGACY_STATUS,
};

pub static UPDATE_THREAD_NETWORK_RESPONSE: ResponseSchema = ResponseSchema {
    name: "UpdateThreadNetworkResponse",
    fields: STATUS_TEXT_FIELDS,
    status: LEGACY_STATUS,
};

pub static REMOVE_NETWORK_RESPONSE: ResponseSchema = ResponseSchema {
    name: "RemoveNetworkResponse",
    fields: STATUS_TEXT_FIELDS,
    status: LEGACY_STATUS,
};

pub static ENABLE_NETWORK_RESPONSE: ResponseSchema = ResponseSchema {
    name: "EnableNetworkResponse",
    fields: STATUS_TEXT_FIELDS,
    status: LEGACY_STATUS,
};

pub static DISABLE_NETWORK_RESPONSE: ResponseSchema = ResponseSchema {
    name: "DisableNetworkResponse",
    fields: STATUS_TEXT_FIELDS,
    status: LEGACY_STATUS,
};

pub static RESPONSES: &[(u32, &ResponseSchema)] = &[
    (
        response_commands::SCAN_NETWORKS_RESPONSE,
        &SCAN_NETWORKS_RESPONSE,
    ),
    (
        response_commands::ADD_WIFI_NETWORK_RESPONSE,
        &ADD_WIFI_NETWORK_RESPONSE,
    ),
    (
        response_commands::UPDATE_WIFI_NETWORK_RESPONSE,
        &UPDATE_WIFI_NETWORK_RESPONSE,
    ),
    (
        response_commands::ADD_THREAD_NETWORK_RESPONSE,
        &ADD_THREAD_NETWORK_RESPONSE,
    ),
    (
        response_commands::UPDATE_THREAD_NETWORK_RESPONSE,
        &UPDATE_THREAD_NETWORK_RESPONSE,
    ),
    (
        response_commands::REMOVE_NETWORK_RESPONSE,
        &REMOVE_NETWORK_RESPONSE,
    ),
    (
        response_commands::ENABLE_NETWORK_RESPONSE,
        &ENABLE_NETWORK_RESPONSE,
    ),
    (
        response_commands::DISABLE_NETWORK_RESPONSE,
        &DISABLE_NETWORK_RESPONSE,
    ),
];

/// This cluster exposes no list attributes through the response layer.
pub static LIST_ATTRIBUTES: &[(u32, &AttributeSchema)] = &[];

/// Request a network scan. An empty `ssid` scans for every network.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanNetworks {
    pub ssid: Vec<u8>,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl ClusterCommand for ScanNetworks {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::SCAN_NETWORKS;
    type Response = ScanNetworksResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.bytes(&TlvTag::Context(0), &self.ssid)?;
        encode_breadcrumb(tw, 1, self.breadcrumb, self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddWiFiNetwork {
    pub ssid: Vec<u8>,
    pub credentials: Vec<u8>,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl ClusterCommand for AddWiFiNetwork {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::ADD_WIFI_NETWORK;
    type Response = StatusTextResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.bytes(&TlvTag::Context(0), &self.ssid)?;
        tw.bytes(&TlvTag::Context(1), &self.credentials)?;
        encode_breadcrumb(tw, 2, self.breadcrumb, self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddThreadNetwork {
    pub operational_dataset: Vec<u8>,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl ClusterCommand for AddThreadNetwork {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::ADD_THREAD_NETWORK;
    type Response = StatusTextResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.bytes(&TlvTag::Context(0), &self.operational_dataset)?;
        encode_breadcrumb(tw, 1, self.breadcrumb, self.timeout_ms)
    }
}

/// Replace the credentials of an already configured WiFi network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateWiFiNetwork {
    pub ssid: Vec<u8>,
    pub credentials: Vec<u8>,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl ClusterCommand for UpdateWiFiNetwork {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::UPDATE_WIFI_NETWORK;
    type Response = StatusTextResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.bytes(&TlvTag::Context(0), &self.ssid)?;
        tw.bytes(&TlvTag::Context(1), &self.credentials)?;
        encode_breadcrumb(tw, 2, self.breadcrumb, self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateThreadNetwork {
    pub operational_dataset: Vec<u8>,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl ClusterCommand for UpdateThreadNetwork {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::UPDATE_THREAD_NETWORK;
    type Response = StatusTextResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.bytes(&TlvTag::Context(0), &self.operational_dataset)?;
        encode_breadcrumb(tw, 1, self.breadcrumb, self.timeout_ms)
    }
}

/// Which per-network operation a [`NetworkIdCommand`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkOperation {
    Remove,
    Enable,
    Disable,
}

/// Remove, enable or disable a configured network by ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdCommand {
    pub operation: NetworkOperation,
    pub network_id: Vec<u8>,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl NetworkIdCommand {
    pub fn command_id(&self) -> u32 {
        match self.operation {
            NetworkOperation::Remove => commands::REMOVE_NETWORK,
            NetworkOperation::Enable => commands::ENABLE_NETWORK,
            NetworkOperation::Disable => commands::DISABLE_NETWORK,
        }
    }

    pub fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.bytes(&TlvTag::Context(0), &self.network_id)?;
        encode_breadcrumb(tw, 1, self.breadcrumb, self.timeout_ms)
    }
}

/// Typed wrapper for the remove operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveNetwork {
    pub network_id: Vec<u8>,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl ClusterCommand for RemoveNetwork {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::REMOVE_NETWORK;
    type Response = StatusTextResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        NetworkIdCommand {
            operation: NetworkOperation::Remove,
            network_id: self.network_id.clone(),
            breadcrumb: self.breadcrumb,
            timeout_ms: self.timeout_ms,
        }
        .encode(tw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableNetwork {
    pub network_id: Vec<u8>,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl ClusterCommand for EnableNetwork {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::ENABLE_NETWORK;
    type Response = StatusTextResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        NetworkIdCommand {
            operation: NetworkOperation::Enable,
            network_id: self.network_id.clone(),
            breadcrumb: self.breadcrumb,
            timeout_ms: self.timeout_ms,
        }
        .encode(tw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableNetwork {
    pub network_id: Vec<u8>,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl ClusterCommand for DisableNetwork {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::DISABLE_NETWORK;
    type Response = StatusTextResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        NetworkIdCommand {
            operation: NetworkOperation::Disable,
            network_id: self.network_id.clone(),
            breadcrumb: self.breadcrumb,
            timeout_ms: self.timeout_ms,
        }
        .encode(tw)
    }
}

/// One access point found by a WiFi scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiFiInterfaceScanResult {
    pub security: u8,
    pub ssid: Vec<u8>,
    pub bssid: Vec<u8>,
    pub channel: u8,
    pub frequency_band: u32,
}

impl FromDecoded for WiFiInterfaceScanResult {
    fn from_decoded(value: &DecodedValue) -> Result<Self, TlvError> {
        let fields = value.as_struct()?;
        Ok(Self {
            security: fields.required(0)?.as_u8()?,
            ssid: fields.required(1)?.as_bytes()?.to_vec(),
            bssid: fields.required(2)?.as_bytes()?.to_vec(),
            channel: fields.required(3)?.as_u8()?,
            frequency_band: fields.required(4)?.as_u32()?,
        })
    }
}

/// One Thread network found by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInterfaceScanResult {
    pub pan_id: u16,
    pub extended_pan_id: u64,
    pub network_name: String,
    pub channel: u16,
    pub version: u8,
    pub extended_address: Vec<u8>,
    pub rssi: i8,
    pub lqi: u8,
}

impl FromDecoded for ThreadInterfaceScanResult {
    fn from_decoded(value: &DecodedValue) -> Result<Self, TlvError> {
        let fields = value.as_struct()?;
        Ok(Self {
            pan_id: fields.required(0)?.as_u16()?,
            extended_pan_id: fields.required(1)?.as_u64()?,
            network_name: fields.required(2)?.as_str()?.to_string(),
            channel: fields.required(3)?.as_u16()?,
            version: fields.required(4)?.as_u8()?,
            extended_address: fields.required(5)?.as_bytes()?.to_vec(),
            rssi: fields.required(6)?.as_i8()?,
            lqi: fields.required(7)?.as_u8()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanNetworksResponse {
    pub error_code: u8,
    pub debug_text: String,
    pub wifi_scan_results: ListAttribute<WiFiInterfaceScanResult>,
    pub thread_scan_results: ListAttribute<ThreadInterfaceScanResult>,
}

impl ClusterResponse for ScanNetworksResponse {
    fn from_fields(fields: &ResponseFields) -> Result<Self, TlvError> {
        Ok(Self {
            error_code: fields.required(0)?.as_u8()?,
            debug_text: optional_text(fields, 1),
            wifi_scan_results: optional_list(fields, 2)?,
            thread_scan_results: optional_list(fields, 3)?,
        })
    }
}
