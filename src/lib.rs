//! Matter cluster client library.
//!
//! Sends typed cluster commands and attribute reads over an asynchronous
//! transport and routes each TLV-encoded response back to the callback that
//! issued the request, exactly once.

pub mod callback;
pub mod client;
pub mod clusters;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod status;
pub mod tlv;
pub mod transport;

pub use callback::{CallbackRegistry, CommandFailure, CommandOutcome, ContextHandle, StatusFailure};
pub use client::ClusterClient;
pub use error::{ClientError, Result};
