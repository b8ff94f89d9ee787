use super::{
    AttributeSchema, ClusterCommand, ClusterResponse, FieldKind, FieldSpec, FromDecoded,
    ListAttributeSpec, ResponseSchema, StatusField, optional_text,
};
use crate::dispatch::{DecodedValue, ResponseFields};
use crate::status::{StatusCode, StatusConvention};
use crate::tlv::{TlvError, TlvTag, TlvWriter};
use strum::{Display, FromRepr};

/// Matter Cluster ID for Operational Credentials
pub const CLUSTER_ID: u32 = 0x003E;

/// Request command IDs
pub mod commands {
    pub const ATTESTATION_REQUEST: u32 = 0x00;
    pub const CERTIFICATE_CHAIN_REQUEST: u32 = 0x02;
    pub const OP_CSR_REQUEST: u32 = 0x04;
    pub const ADD_NOC: u32 = 0x06;
    pub const UPDATE_NOC: u32 = 0x07;
    pub const UPDATE_FABRIC_LABEL: u32 = 0x09;
    pub const REMOVE_FABRIC: u32 = 0x0A;
}

/// Response command IDs
pub mod response_commands {
    pub const ATTESTATION_RESPONSE: u32 = 0x01;
    pub const CERTIFICATE_CHAIN_RESPONSE: u32 = 0x03;
    pub const OP_CSR_RESPONSE: u32 = 0x05;
    pub const NOC_RESPONSE: u32 = 0x08;
}

/// Attribute IDs
pub mod attributes {
    pub const FABRICS_LIST: u32 = 0x0001;
    pub const SUPPORTED_FABRICS: u32 = 0x0002;
    pub const COMMISSIONED_FABRICS: u32 = 0x0003;
    pub const TRUSTED_ROOT_CERTIFICATES: u32 = 0x0004;
    pub const CURRENT_FABRIC_INDEX: u32 = 0x0005;
}

/// Operational certificate status carried in `NOCResponse.statusCode`.
///
/// This numbering is private to the cluster and does not overlap with
/// [`crate::status::LegacyStatus`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, Display)]
#[repr(u8)]
pub enum OperationalCertStatus {
    Success = 0x00,
    InvalidPublicKey = 0x01,
    InvalidNodeOpId = 0x02,
    InvalidNoc = 0x03,
    MissingCsr = 0x04,
    TableFull = 0x05,
    InsufficientPrivilege = 0x08,
    FabricConflict = 0x09,
    LabelConflict = 0x0A,
    InvalidFabricIndex = 0x0B,
}

impl OperationalCertStatus {
    /// Interpret a failure status delivered for a NOC command.
    pub fn from_status(status: &StatusCode) -> Option<Self> {
        match status.convention {
            StatusConvention::ClusterSpecific => Self::from_repr(status.value),
            StatusConvention::Legacy => None,
        }
    }
}

pub static ATTESTATION_RESPONSE: ResponseSchema = ResponseSchema {
    name: "AttestationResponse",
    fields: &[
        FieldSpec::required(0, "attestationElements", FieldKind::Bytes),
        FieldSpec::required(1, "signature", FieldKind::Bytes),
    ],
    status: None,
};

pub static CERTIFICATE_CHAIN_RESPONSE: ResponseSchema = ResponseSchema {
    name: "CertificateChainResponse",
    fields: &[FieldSpec::required(0, "certificate", FieldKind::Bytes)],
    status: None,
};

pub static OP_CSR_RESPONSE: ResponseSchema = ResponseSchema {
    name: "OpCSRResponse",
    fields: &[
        FieldSpec::required(0, "nocsrElements", FieldKind::Bytes),
        FieldSpec::required(1, "attestationSignature", FieldKind::Bytes),
    ],
    status: None,
};

pub static NOC_RESPONSE: ResponseSchema = ResponseSchema {
    name: "NOCResponse",
    fields: &[
        FieldSpec::required(0, "statusCode", FieldKind::Unsigned),
        FieldSpec::optional(1, "fabricIndex", FieldKind::Unsigned),
        FieldSpec::optional(2, "debugText", FieldKind::Bytes),
    ],
    status: Some(StatusField {
        tag: 0,
        convention: StatusConvention::ClusterSpecific,
        debug_text: Some(2),
    }),
};

const FABRIC_DESCRIPTOR_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(0, "fabricIndex", FieldKind::Unsigned),
    FieldSpec::required(1, "rootPublicKey", FieldKind::Bytes),
    FieldSpec::required(2, "vendorId", FieldKind::Unsigned),
    FieldSpec::required(3, "fabricId", FieldKind::Unsigned),
    FieldSpec::required(4, "nodeId", FieldKind::Unsigned),
    FieldSpec::optional(5, "label", FieldKind::Utf8),
];

pub static FABRICS_LIST: AttributeSchema = AttributeSchema {
    name: "FabricsList",
    entry: FieldKind::Struct(FABRIC_DESCRIPTOR_FIELDS),
};

pub static TRUSTED_ROOT_CERTIFICATES: AttributeSchema = AttributeSchema {
    name: "TrustedRootCertificates",
    entry: FieldKind::Bytes,
};

pub static RESPONSES: &[(u32, &ResponseSchema)] = &[
    (response_commands::ATTESTATION_RESPONSE, &ATTESTATION_RESPONSE),
    (
        response_commands::CERTIFICATE_CHAIN_RESPONSE,
        &CERTIFICATE_CHAIN_RESPONSE,
    ),
    (response_commands::OP_CSR_RESPONSE, &OP_CSR_RESPONSE),
    (response_commands::NOC_RESPONSE, &NOC_RESPONSE),
];

pub static LIST_ATTRIBUTES: &[(u32, &AttributeSchema)] = &[
    (attributes::FABRICS_LIST, &FABRICS_LIST),
    (
        attributes::TRUSTED_ROOT_CERTIFICATES,
        &TRUSTED_ROOT_CERTIFICATES,
    ),
];

/// Certificate requested by [`CertificateChainRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CertificateType {
    Dac = 0x01,
    Pai = 0x02,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationRequest {
    pub attestation_nonce: Vec<u8>,
}

impl ClusterCommand for AttestationRequest {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::ATTESTATION_REQUEST;
    type Response = AttestationResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.bytes(&TlvTag::Context(0), &self.attestation_nonce)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateChainRequest {
    pub certificate_type: CertificateType,
}

impl ClusterCommand for CertificateChainRequest {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::CERTIFICATE_CHAIN_REQUEST;
    type Response = CertificateChainResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.u8(&TlvTag::Context(0), self.certificate_type as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpCsrRequest {
    pub csr_nonce: Vec<u8>,
}

impl ClusterCommand for OpCsrRequest {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::OP_CSR_REQUEST;
    type Response = OpCsrResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.bytes(&TlvTag::Context(0), &self.csr_nonce)
    }
}

/// Install a node operational certificate chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddNoc {
    pub noc_value: Vec<u8>,
    pub icac_value: Option<Vec<u8>>,
    pub ipk_value: Vec<u8>,
    pub case_admin_node: u64,
    pub admin_vendor_id: u16,
}

impl ClusterCommand for AddNoc {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::ADD_NOC;
    type Response = NocResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.bytes(&TlvTag::Context(0), &self.noc_value)?;
        if let Some(icac) = &self.icac_value {
            tw.bytes(&TlvTag::Context(1), icac)?;
        }
        tw.bytes(&TlvTag::Context(2), &self.ipk_value)?;
        tw.u64(&TlvTag::Context(3), self.case_admin_node)?;
        tw.u16(&TlvTag::Context(4), self.admin_vendor_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFabricLabel {
    pub label: String,
}

impl ClusterCommand for UpdateFabricLabel {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::UPDATE_FABRIC_LABEL;
    type Response = NocResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.utf8(&TlvTag::Context(0), &self.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveFabric {
    pub fabric_index: u8,
}

impl ClusterCommand for RemoveFabric {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const COMMAND_ID: u32 = commands::REMOVE_FABRIC;
    type Response = NocResponse;

    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError> {
        tw.u8(&TlvTag::Context(0), self.fabric_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationResponse {
    pub attestation_elements: Vec<u8>,
    pub signature: Vec<u8>,
}

impl ClusterResponse for AttestationResponse {
    fn from_fields(fields: &ResponseFields) -> Result<Self, TlvError> {
        Ok(Self {
            attestation_elements: fields.required(0)?.as_bytes()?.to_vec(),
            signature: fields.required(1)?.as_bytes()?.to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChainResponse {
    pub certificate: Vec<u8>,
}

impl ClusterResponse for CertificateChainResponse {
    fn from_fields(fields: &ResponseFields) -> Result<Self, TlvError> {
        Ok(Self {
            certificate: fields.required(0)?.as_bytes()?.to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpCsrResponse {
    pub nocsr_elements: Vec<u8>,
    pub attestation_signature: Vec<u8>,
}

impl ClusterResponse for OpCsrResponse {
    fn from_fields(fields: &ResponseFields) -> Result<Self, TlvError> {
        Ok(Self {
            nocsr_elements: fields.required(0)?.as_bytes()?.to_vec(),
            attestation_signature: fields.required(1)?.as_bytes()?.to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NocResponse {
    pub status_code: u8,
    pub fabric_index: Option<u8>,
    pub debug_text: String,
}

impl ClusterResponse for NocResponse {
    fn from_fields(fields: &ResponseFields) -> Result<Self, TlvError> {
        Ok(Self {
            status_code: fields.required(0)?.as_u8()?,
            fabric_index: fields.get(1).map(DecodedValue::as_u8).transpose()?,
            debug_text: optional_text(fields, 2),
        })
    }
}

/// Entry of the FabricsList attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricDescriptor {
    pub fabric_index: u8,
    pub root_public_key: Vec<u8>,
    pub vendor_id: u16,
    pub fabric_id: u64,
    pub node_id: u64,
    pub label: String,
}

impl FromDecoded for FabricDescriptor {
    fn from_decoded(value: &DecodedValue) -> Result<Self, TlvError> {
        let fields = value.as_struct()?;
        Ok(Self {
            fabric_index: fields.required(0)?.as_u8()?,
            root_public_key: fields.required(1)?.as_bytes()?.to_vec(),
            vendor_id: fields.required(2)?.as_u16()?,
            fabric_id: fields.required(3)?.as_u64()?,
            node_id: fields.required(4)?.as_u64()?,
            label: optional_text(fields, 5),
        })
    }
}

pub struct FabricsList;

impl ListAttributeSpec for FabricsList {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const ATTRIBUTE_ID: u32 = attributes::FABRICS_LIST;
    type Entry = FabricDescriptor;
}

/// Each entry is a DER-encoded root certificate.
pub struct TrustedRootCertificates;

impl ListAttributeSpec for TrustedRootCertificates {
    const CLUSTER_ID: u32 = CLUSTER_ID;
    const ATTRIBUTE_ID: u32 = attributes::TRUSTED_ROOT_CERTIFICATES;
    type Entry = Vec<u8>;
}
