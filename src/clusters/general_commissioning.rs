use super::{
    AttributeSchema, ClusterCommand, FieldKind, FieldSpec, FromDecoded, LEGACY_STATUS,
    ListAttributeSpec, ResponseSchema, STATUS_TEXT_FIELDS, StatusTextResponse, encode_breadcrumb,
};
use crate::dispatch::DecodedValue;
use crate::tlv::{TlvError, TlvTag, TlvWriter};

/// Matter Cluster ID for General Commissioning
pub const CLUSTER_ID: u32 = 0x0030;

/// Request command IDs
pub mod commands {
    pub const ARM_FAIL_SAFE: u32 = 0x00;
    pub const SET_REGULATORY_CONFIG: u32 = 0x02;
    pub const COMMISSIONING_COMPLETE: u32 = 0x04;
}

/// Response command IDs
pub mod response_commands {
    pub const ARM_FAIL_SAFE_RESPONSE: u32 = 0x01;
    pub const SET_REGULATORY_CONFIG_RESPONSE: u32 = 0x03;
    pub const COMMISSIONING_COMPLETE_RESPONSE: u32 = 0x05;
}

/// Attribute IDs
pub mod attributes {
    pub const BREADCRUMB: u32 = 0x0000;
    pub const BASIC_COMMISSIONING_INFO_LIST: u32 = 0x0001;
}

pub static ARM_FAIL_SAFE_RESPONSE: ResponseSchema = ResponseSchema {
    name: "ArmFailSafeResponse",
    fields: STATUS_TEXT_FIELDS,
    status: LEGACY_STATUS,
};

pub static SET_REGULATORY_CONFIG_RESPONSE: ResponseSchema = ResponseSchema {
    name: "SetRegulatoryConfigResponse",
    fields: STATUS_TEXT_FIELDS,
    status: LEGACY_STATUS,
};

pub static COMMISSIONING_COMPLETE_RESPONSE: ResponseSchema = ResponseSchema {
    name: "CommissioningCompleteResponse",
    fields: STATUS_TEXT_FIELDS,
    status: LEGACY_STATUS,
};

const BASIC_COMMISSIONING_INFO_FIELDS: &[FieldSpec] = &[FieldSpec::required(
    0,
    "failSafeExpiryLengthMs",
    FieldKind::Unsigned,
)];

pub static BASIC_COMMISSIONING_INFO_LIST: AttributeSchema = AttributeSchema {
    name: "BasicCommissioningInfoList",
    entry: FieldKind::Struct(BASIC_COMMISSIONING_INFO_FIELDS),
};

pub static RESPONSES: &[(u32, &ResponseSchema)] = &[
    (
        response_commands::ARM_FAIL_SAFE_RESPONSE,
        &ARM_FAIL_SAFE_RESPONSE,
    ),
    (
        response_commands::SET_REGULATORY_CONFIG_RESPONSE,
        &SET_REGULATORY_CONFIG_RESPONSE,
    ),
    (
        response_commands::COMMISSIONING_COMPLETE_RESPONSE,
        &COMMISSIONING_COMPLETE_RESPONSE,
    ),
];

pub static LIST_ATTRIBUTES: &[(u32, &AttributeSchema)] = &[(
    attributes::BASIC_COMMISSIONING_INFO_LIST,
    &BASIC_COMMISSIONING_INFO_LIST,
)];

/// Where the device is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RegulatoryLocation {
    #[default]
    Indoor = 0x00,
    Outdoor = 0x01,
    IndoorOutdoor = 0x02,
}

/// Arm (or disarm, with zero expiry) the commissioning fail-safe timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmFailSafe {
    pub expiry_length_seconds: u16,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl ClusterCommand for ArmFailSafe {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::ARM_FAIL_SAFE;
    type Response = StatusTextResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.u16(&TlvTag::Context(0), self.expiry_length_seconds)?;
        encode_breadcrumb(tw, 1, self.breadcrumb, self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRegulatoryConfig {
    pub location: RegulatoryLocation,
    pub country_code: String,
    pub breadcrumb: u64,
    pub timeout_ms: u32,
}

impl ClusterCommand for SetRegulatoryConfig {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::SET_REGULATORY_CONFIG;
    type Response = StatusTextResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.u8(&TlvTag::Context(0), self.location as u8)?;
        tw.utf8(&TlvTag::Context(1), &self.country_code)?;
        encode_breadcrumb(tw, 2, self.breadcrumb, self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommissioningComplete;

impl ClusterCommand for CommissioningComplete {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::COMMISSIONING_COMPLETE;
    type Response = StatusTextResponse;

    fn encode(&self, _tw: &mut TlvWriter) -> Result<(), TlvError> {
        Ok(())
    }
}

/// Entry of the BasicCommissioningInfoList attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicCommissioningInfo {
    pub fail_safe_expiry_length_ms: u32,
}

impl FromDecoded for BasicCommissioningInfo {
    fn from_decoded(value: &DecodedValue) -> Result<Self, TlvError> {
        let fields = value.as_struct()?;
        Ok(Self {
            fail_safe_expiry_length_ms: fields.required(0)?.as_u32()?,
        })
    }
}

pub struct BasicCommissioningInfoList;

impl ListAttributeSpec for BasicCommissioningInfoList {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const ATTRIBUTE_ID: u32 = attributes::BASIC_COMMISSIONING_INFO_LIST;
    type Entry = BasicCommissioningInfo;
}
