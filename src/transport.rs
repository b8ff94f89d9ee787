//! Transport boundary.
//!
//! The session layer that actually carries frames lives outside this crate.
//! Requests leave through the [`Transport`] trait; responses come back as
//! [`ResponseFrame`]s handed to [`ClusterClient::deliver`], either directly or
//! through [`run_delivery_loop`] when the transport is channel-based.

use crate::callback::ContextHandle;
use crate::client::ClusterClient;
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Transport-level failure. Carries no status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    #[error("response timed out")]
    Timeout,

    #[error("session closed")]
    SessionClosed,

    #[error("request canceled")]
    Canceled,

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// What an outbound request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Invoke { command_id: u32 },
    ReadAttribute { attribute_id: u32 },
}

/// Outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub cluster_id: u32,
    pub kind: RequestKind,
    pub context: ContextHandle,
    pub payload: Vec<u8>,
}

/// What an inbound response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Cluster-specific response command with a TLV payload.
    Command { command_id: u32 },
    /// List attribute report with a TLV array payload.
    Attribute { attribute_id: u32 },
    /// Bare legacy status for a command without response data.
    Status(u8),
}

/// Inbound response, tagged with the context of the request it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub cluster_id: u32,
    pub kind: ResponseKind,
    pub context: ContextHandle,
    pub payload: Vec<u8>,
}

impl ResponseFrame {
    pub fn command(cluster_id: u32, command_id: u32, context: ContextHandle, payload: Vec<u8>) -> Self {
        Self {
            cluster_id,
            kind: ResponseKind::Command { command_id },
            context,
            payload,
        }
    }

    pub fn attribute(
        cluster_id: u32,
        attribute_id: u32,
        context: ContextHandle,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            cluster_id,
            kind: ResponseKind::Attribute { attribute_id },
            context,
            payload,
        }
    }

    pub fn status(cluster_id: u32, context: ContextHandle, status: u8) -> Self {
        Self {
            cluster_id,
            kind: ResponseKind::Status(status),
            context,
            payload: Vec::new(),
        }
    }
}

/// Outbound half of a session.
pub trait Transport: Send + Sync {
    fn send(&self, frame: RequestFrame) -> Result<(), TransportFailure>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, frame: RequestFrame) -> Result<(), TransportFailure> {
        (**self).send(frame)
    }
}

/// Transport that queues requests on a bounded tokio channel.
pub struct ChannelTransport {
    tx: mpsc::Sender<RequestFrame>,
}

impl ChannelTransport {
    /// Create the transport and the receiver the session side drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RequestFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: RequestFrame) -> Result<(), TransportFailure> {
        debug!(
            "Queueing request for cluster 0x{:04X} ({:?}) on {}",
            frame.cluster_id, frame.kind, frame.context
        );
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => TransportFailure::SendFailed("outbound queue full".to_string()),
            TrySendError::Closed(_) => TransportFailure::SessionClosed,
        })
    }
}

/// Feed inbound responses to the client until the channel closes.
///
/// When the session side drops its sender, every request still waiting is
/// failed with [`TransportFailure::SessionClosed`].
pub async fn run_delivery_loop<T: Transport>(
    client: Arc<ClusterClient<T>>,
    mut rx: mpsc::Receiver<ResponseFrame>,
) {
    info!("Starting response delivery loop");

    while let Some(frame) = rx.recv().await {
        let context = frame.context;
        if let Err(e) = client.deliver(frame) {
            warn!("Response for {} not delivered: {}", context, e);
        }
    }

    let failed = client.session_closed();
    info!(
        "Response channel closed, failed {} pending request(s)",
        failed
    );
}
