//! Response status codes.
//!
//! Responses carry either a legacy ZCL-style status (`EmberAfStatus` numbering)
//! or a cluster-specific code whose meaning is defined by the cluster itself
//! (for example the operational certificate status in `NOCResponse`). The two
//! numbering spaces are not interchangeable, so every code travels with its
//! [`StatusConvention`].

use std::fmt;
use strum::{Display, FromRepr};

/// Legacy status codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, Display)]
#[repr(u8)]
pub enum LegacyStatus {
    Success = 0x00,
    Failure = 0x01,
    NotAuthorized = 0x7E,
    MalformedCommand = 0x80,
    UnsupCommand = 0x81,
    UnsupGeneralCommand = 0x82,
    UnsupManufClusterCommand = 0x83,
    UnsupManufGeneralCommand = 0x84,
    InvalidField = 0x85,
    UnsupportedAttribute = 0x86,
    InvalidValue = 0x87,
    ReadOnly = 0x88,
    InsufficientSpace = 0x89,
    DuplicateExists = 0x8A,
    NotFound = 0x8B,
    UnreportableAttribute = 0x8C,
    InvalidDataType = 0x8D,
    InvalidSelector = 0x8E,
    WriteOnly = 0x8F,
    InconsistentStartupState = 0x90,
    DefinedOutOfBand = 0x91,
    Inconsistent = 0x92,
    ActionDenied = 0x93,
    Timeout = 0x94,
    Abort = 0x95,
    InvalidImage = 0x96,
    WaitForData = 0x97,
    NoImageAvailable = 0x98,
    RequireMoreImage = 0x99,
    NotificationPending = 0x9A,
    HardwareFailure = 0xC0,
    SoftwareFailure = 0xC1,
    CalibrationError = 0xC2,
    UnsupportedCluster = 0xC3,
}

/// Numbering space a status code belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusConvention {
    Legacy,
    ClusterSpecific,
}

/// A status code tagged with its convention. Zero means success in both.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusCode {
    pub value: u8,
    pub convention: StatusConvention,
}

impl StatusCode {
    pub fn legacy(value: u8) -> Self {
        Self {
            value,
            convention: StatusConvention::Legacy,
        }
    }

    pub fn cluster_specific(value: u8) -> Self {
        Self {
            value,
            convention: StatusConvention::ClusterSpecific,
        }
    }

    pub fn is_success(&self) -> bool {
        self.value == 0
    }

    /// Named legacy status, if this code uses the legacy numbering.
    pub fn legacy_status(&self) -> Option<LegacyStatus> {
        match self.convention {
            StatusConvention::Legacy => LegacyStatus::from_repr(self.value),
            StatusConvention::ClusterSpecific => None,
        }
    }
}

impl From<LegacyStatus> for StatusCode {
    fn from(status: LegacyStatus) -> Self {
        Self::legacy(status as u8)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.legacy_status() {
            Some(status) => write!(f, "{} (0x{:02X})", status, self.value),
            None => write!(f, "0x{:02X}", self.value),
        }
    }
}
