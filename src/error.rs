use crate::callback::ContextHandle;
use crate::tlv::TlvError;
use crate::transport::TransportFailure;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ClientError {
    #[error("TLV error: {0}")]
    Tlv(#[from] TlvError),

    #[error("Context already registered: {0}")]
    DuplicateContext(ContextHandle),

    #[error("Context already retired: {0}")]
    RetiredContext(ContextHandle),

    #[error("Context not live: {0}")]
    UnknownContext(ContextHandle),

    #[error("No response schema for cluster 0x{cluster_id:04X} command 0x{command_id:02X}")]
    UnknownCommand { cluster_id: u32, command_id: u32 },

    #[error("No list attribute schema for cluster 0x{cluster_id:04X} attribute 0x{attribute_id:04X}")]
    UnknownAttribute { cluster_id: u32, attribute_id: u32 },

    #[error("Transport failure: {0}")]
    Transport(TransportFailure),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
