//! Command issuance and response delivery.
//!
//! [`ClusterClient`] ties the pieces together: it encodes a request, registers
//! the caller's callback under a fresh context, sends the request through the
//! [`Transport`], and later routes the matching [`ResponseFrame`] through the
//! [`ResponseDispatcher`].
//!
//! Registration happens before the send, so a response can never arrive for
//! a context the registry does not know yet.

use crate::callback::{CallbackRegistry, CommandFailure, CommandOutcome, ContextHandle};
use crate::clusters::{ClusterCommand, ClusterResponse, FromDecoded, ListAttributeSpec, SchemaTable};
use crate::config::ClientConfig;
use crate::dispatch::{ResponseDispatcher, ResponseFields};
use crate::error::{ClientError, Result};
use crate::status::StatusCode;
use crate::tlv::{ListAttribute, TlvError, TlvTag, TlvWriter};
use crate::transport::{RequestFrame, RequestKind, ResponseFrame, ResponseKind, Transport, TransportFailure};
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::timeout;

/// Encode a request body as the anonymous structure every command payload is.
pub fn encode_request(
    encode: impl FnOnce(&mut TlvWriter) -> std::result::Result<(), TlvError>,
) -> std::result::Result<Vec<u8>, TlvError> {
    let mut tw = TlvWriter::new();
    tw.start_struct(&TlvTag::Anonymous)?;
    encode(&mut tw)?;
    tw.end_container()?;
    tw.finish()
}

pub struct ClusterClient<T: Transport> {
    transport: T,
    registry: Arc<CallbackRegistry>,
    dispatcher: ResponseDispatcher,
    config: ClientConfig,
}

impl<T: Transport> ClusterClient<T> {
    pub fn new(transport: T, schemas: Arc<SchemaTable>, config: ClientConfig) -> Self {
        let registry = Arc::new(CallbackRegistry::new());
        let dispatcher = ResponseDispatcher::new(schemas, registry.clone());
        Self {
            transport,
            registry,
            dispatcher,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &ResponseDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a raw command with split callbacks. Returns the context it was issued under.
    pub fn issue<S, F, E>(
        &self,
        cluster_id: u32,
        command_id: u32,
        on_success: S,
        on_failure: F,
        encode: E,
    ) -> Result<ContextHandle>
    where
        S: FnOnce(ResponseFields) + Send + 'static,
        F: FnOnce(CommandFailure) + Send + 'static,
        E: FnOnce(&mut TlvWriter) -> std::result::Result<(), TlvError>,
    {
        let context = self.registry.allocate();
        match self.issue_with(context, cluster_id, command_id, on_success, on_failure, encode) {
            Ok(()) => Ok(context),
            Err(e) => {
                self.registry.cancel(context);
                Err(e)
            }
        }
    }

    /// Like [`issue`](Self::issue) but under a context the caller allocated.
    ///
    /// A context that is already live fails with `DuplicateContext` and its
    /// existing registration is left alone.
    pub fn issue_with<S, F, E>(
        &self,
        context: ContextHandle,
        cluster_id: u32,
        command_id: u32,
        on_success: S,
        on_failure: F,
        encode: E,
    ) -> Result<()>
    where
        S: FnOnce(ResponseFields) + Send + 'static,
        F: FnOnce(CommandFailure) + Send + 'static,
        E: FnOnce(&mut TlvWriter) -> std::result::Result<(), TlvError>,
    {
        let payload = encode_request(encode)?;
        self.registry.register(context, on_success, on_failure)?;
        self.send(RequestFrame {
            cluster_id,
            kind: RequestKind::Invoke { command_id },
            context,
            payload,
        })
    }

    /// Send a typed command. `callback` receives the typed outcome exactly once.
    pub fn invoke<C, H>(&self, command: &C, callback: H) -> Result<ContextHandle>
    where
        C: ClusterCommand,
        H: FnOnce(CommandOutcome<C::Response>) + Send + 'static,
    {
        let payload = encode_request(|tw| command.encode(tw))?;
        self.submit(
            C::CLUSTER_ID,
            RequestKind::Invoke {
                command_id: C::COMMAND_ID,
            },
            payload,
            move |outcome| {
                callback(outcome.and_then_convert(|fields| C::Response::from_fields(&fields)))
            },
        )
    }

    /// Send a typed command and wait for its outcome.
    ///
    /// If no response arrives within the configured timeout the context is
    /// canceled and the outcome is `Transport(Timeout)`.
    pub async fn invoke_async<C: ClusterCommand>(
        &self,
        command: &C,
    ) -> Result<CommandOutcome<C::Response>> {
        let (tx, rx) = oneshot::channel();
        let context = self.invoke(command, move |outcome| {
            let _ = tx.send(outcome);
        })?;
        Ok(self.wait_for(context, rx).await)
    }

    /// Read a list attribute. `callback` receives the decoded entries exactly once.
    pub fn read_list_attribute<A, H>(&self, callback: H) -> Result<ContextHandle>
    where
        A: ListAttributeSpec,
        H: FnOnce(CommandOutcome<ListAttribute<A::Entry>>) + Send + 'static,
    {
        self.submit(
            A::CLUSTER_ID,
            RequestKind::ReadAttribute {
                attribute_id: A::ATTRIBUTE_ID,
            },
            Vec::new(),
            move |outcome| callback(outcome.and_then_convert(list_entries::<A::Entry>)),
        )
    }

    pub async fn read_list_attribute_async<A: ListAttributeSpec>(
        &self,
    ) -> Result<CommandOutcome<ListAttribute<A::Entry>>> {
        let (tx, rx) = oneshot::channel();
        let context = self.read_list_attribute::<A, _>(move |outcome| {
            let _ = tx.send(outcome);
        })?;
        Ok(self.wait_for(context, rx).await)
    }

    /// Route an inbound response to the callback registered under its context.
    pub fn deliver(&self, frame: ResponseFrame) -> Result<()> {
        match frame.kind {
            ResponseKind::Command { command_id } => {
                self.dispatcher
                    .dispatch(frame.cluster_id, command_id, frame.context, &frame.payload)
            }
            ResponseKind::Attribute { attribute_id } => self.dispatcher.dispatch_attribute(
                frame.cluster_id,
                attribute_id,
                frame.context,
                &frame.payload,
            ),
            ResponseKind::Status(status) => self
                .dispatcher
                .dispatch_status(frame.context, StatusCode::legacy(status)),
        }
    }

    /// Cancel a pending request. Its callback will never fire.
    pub fn cancel(&self, context: ContextHandle) -> bool {
        self.registry.cancel(context)
    }

    /// Fail every pending request with `SessionClosed`. Returns how many were pending.
    pub fn session_closed(&self) -> usize {
        self.registry.fail_all(TransportFailure::SessionClosed)
    }

    fn submit<H>(&self, cluster_id: u32, kind: RequestKind, payload: Vec<u8>, handler: H) -> Result<ContextHandle>
    where
        H: FnOnce(CommandOutcome) + Send + 'static,
    {
        let context = self.registry.allocate();
        self.registry.register_outcome(context, handler)?;
        self.send(RequestFrame {
            cluster_id,
            kind,
            context,
            payload,
        })?;
        Ok(context)
    }

    /// Send `frame`, retiring its context if the transport refuses it.
    fn send(&self, frame: RequestFrame) -> Result<()> {
        let context = frame.context;
        if let Err(failure) = self.transport.send(frame) {
            warn!("Send failed for {}: {}", context, failure);
            self.registry.cancel(context);
            return Err(ClientError::Transport(failure));
        }
        debug!("Sent request for {}", context);
        Ok(())
    }

    async fn wait_for<R>(
        &self,
        context: ContextHandle,
        mut rx: oneshot::Receiver<CommandOutcome<R>>,
    ) -> CommandOutcome<R> {
        let wait = self.config.response_timeout();
        match timeout(wait, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            // Handler dropped without firing: the context was canceled.
            Ok(Err(_)) => CommandOutcome::Transport(TransportFailure::Canceled),
            Err(_) => {
                if self.registry.cancel(context) {
                    warn!("{} timed out after {:?}", context, wait);
                    return CommandOutcome::Transport(TransportFailure::Timeout);
                }
                // Resolved while the timer fired; the outcome is already on its way.
                rx.await
                    .unwrap_or(CommandOutcome::Transport(TransportFailure::Canceled))
            }
        }
    }
}

fn list_entries<E: FromDecoded>(fields: ResponseFields) -> std::result::Result<ListAttribute<E>, TlvError> {
    fields.required(0)?.as_list()?.try_map(E::from_decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::ContextState;
    use crate::clusters::general_commissioning::{ArmFailSafe, BasicCommissioningInfoList};
    use crate::clusters::network_commissioning::{self, ScanNetworks};
    use crate::clusters::operational_credentials::{
        self, CertificateChainRequest, CertificateType, FabricsList,
    };
    use crate::status::LegacyStatus;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<RequestFrame>>,
        refuse: Mutex<Option<TransportFailure>>,
    }

    impl RecordingTransport {
        fn last(&self) -> RequestFrame {
            self.sent.lock().last().cloned().expect("nothing sent")
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, frame: RequestFrame) -> std::result::Result<(), TransportFailure> {
            if let Some(failure) = self.refuse.lock().clone() {
                return Err(failure);
            }
            self.sent.lock().push(frame);
            Ok(())
        }
    }

    fn client_with(config: ClientConfig) -> (ClusterClient<Arc<RecordingTransport>>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let client = ClusterClient::new(transport.clone(), Arc::new(SchemaTable::builtin()), config);
        (client, transport)
    }

    fn client() -> (ClusterClient<Arc<RecordingTransport>>, Arc<RecordingTransport>) {
        client_with(ClientConfig::default())
    }

    fn status_text_payload(code: u8, text: &str) -> Vec<u8> {
        encode_request(|tw| {
            tw.u8(&TlvTag::Context(0), code)?;
            tw.utf8(&TlvTag::Context(1), text)
        })
        .unwrap()
    }

    #[test]
    fn test_issue_round_trip() {
        let (client, transport) = client();
        let received = Arc::new(Mutex::new(None));
        let sink = received.clone();

        let context = client
            .issue(
                network_commissioning::CLUSTER_ID,
                network_commissioning::commands::SCAN_NETWORKS,
                move |fields| *sink.lock() = Some(fields),
                |failure| panic!("unexpected failure: {}", failure),
                |tw| tw.bytes(&TlvTag::Context(0), b""),
            )
            .unwrap();

        let request = transport.last();
        assert_eq!(request.context, context);
        assert_eq!(
            request.kind,
            RequestKind::Invoke {
                command_id: network_commissioning::commands::SCAN_NETWORKS
            }
        );
        assert_eq!(request.payload, vec![0x15, 0x30, 0x00, 0x00, 0x18]);

        client
            .deliver(ResponseFrame::command(
                network_commissioning::CLUSTER_ID,
                network_commissioning::response_commands::SCAN_NETWORKS_RESPONSE,
                context,
                status_text_payload(0, "done"),
            ))
            .unwrap();

        let fields = received.lock().take().unwrap();
        assert_eq!(fields.required(0).unwrap().as_u8().unwrap(), 0);
        assert_eq!(fields.by_name("debugText").unwrap().as_str().unwrap(), "done");
        assert_eq!(client.registry().state(context), ContextState::Retired);
    }

    #[test]
    fn test_send_failure_retires_context() {
        let (client, transport) = client();
        *transport.refuse.lock() = Some(TransportFailure::SessionClosed);

        let result = client.invoke(
            &ArmFailSafe {
                expiry_length_seconds: 60,
                breadcrumb: 0,
                timeout_ms: 0,
            },
            |_| panic!("callback must not fire"),
        );

        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportFailure::SessionClosed))
        ));
        assert_eq!(client.registry().live_count(), 0);
        assert_eq!(
            client.registry().state(ContextHandle::from_raw(1)),
            ContextState::Retired
        );
    }

    #[test]
    fn test_issue_with_live_context_is_duplicate() {
        let (client, transport) = client();
        let context = client.registry().allocate();
        client.registry().register_outcome(context, |_| {}).unwrap();

        let result = client.issue_with(
            context,
            network_commissioning::CLUSTER_ID,
            network_commissioning::commands::SCAN_NETWORKS,
            |_| {},
            |_| {},
            |_| Ok(()),
        );

        assert!(matches!(result, Err(ClientError::DuplicateContext(c)) if c == context));
        assert!(client.registry().is_live(context));
        assert!(transport.sent.lock().is_empty());
    }

    #[test]
    fn test_typed_invoke_converts_response() {
        let (client, transport) = client();
        let received = Arc::new(Mutex::new(None));
        let sink = received.clone();

        client
            .invoke(
                &CertificateChainRequest {
                    certificate_type: CertificateType::Dac,
                },
                move |outcome| *sink.lock() = Some(outcome),
            )
            .unwrap();
        let request = transport.last();
        assert_eq!(request.payload, vec![0x15, 0x24, 0x00, 0x01, 0x18]);

        let certificate = vec![0x30; 300];
        let payload = encode_request(|tw| tw.bytes(&TlvTag::Context(0), &certificate)).unwrap();
        client
            .deliver(ResponseFrame::command(
                operational_credentials::CLUSTER_ID,
                operational_credentials::response_commands::CERTIFICATE_CHAIN_RESPONSE,
                request.context,
                payload,
            ))
            .unwrap();

        match received.lock().take().unwrap() {
            CommandOutcome::Success(response) => assert_eq!(response.certificate, certificate),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_async_waits_for_delivery() {
        let (client, transport) = client();
        let command = ArmFailSafe {
            expiry_length_seconds: 0,
            breadcrumb: 0,
            timeout_ms: 0,
        };

        let mut pending = task::spawn(client.invoke_async(&command));
        assert_pending!(pending.poll());

        let context = transport.last().context;
        client
            .deliver(ResponseFrame::command(
                0x0030,
                0x01,
                context,
                status_text_payload(LegacyStatus::ActionDenied as u8, "denied"),
            ))
            .unwrap();

        assert!(pending.is_woken());
        let outcome = assert_ready!(pending.poll()).unwrap();
        match outcome {
            CommandOutcome::Status(failure) => {
                assert_eq!(
                    failure.status.legacy_status(),
                    Some(LegacyStatus::ActionDenied)
                );
                assert_eq!(failure.debug_text.as_deref(), Some("denied"));
            }
            other => panic!("expected status failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_async_times_out_and_cancels() {
        let (client, transport) = client_with(ClientConfig {
            response_timeout_ms: 50,
            channel_capacity: 1,
        });

        let outcome = client
            .invoke_async(&ArmFailSafe {
                expiry_length_seconds: 30,
                breadcrumb: 0,
                timeout_ms: 0,
            })
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Transport(TransportFailure::Timeout));

        let context = transport.last().context;
        assert_eq!(client.registry().state(context), ContextState::Retired);
        let late = client.deliver(ResponseFrame::command(
            0x0030,
            0x01,
            context,
            status_text_payload(0, ""),
        ));
        assert!(matches!(late, Err(ClientError::UnknownContext(_))));
    }

    #[tokio::test]
    async fn test_session_closed_fails_pending_requests() {
        let (client, _transport) = client();
        let scan = ScanNetworks::default();

        let mut first = task::spawn(client.invoke_async(&scan));
        let mut second = task::spawn(client.invoke_async(&scan));
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        assert_eq!(client.session_closed(), 2);

        for pending in [&mut first, &mut second] {
            let outcome = assert_ready!(pending.poll()).unwrap();
            assert!(matches!(
                outcome,
                CommandOutcome::Transport(TransportFailure::SessionClosed)
            ));
        }
    }

    #[tokio::test]
    async fn test_canceled_request_reports_canceled() {
        let (client, transport) = client();
        let scan = ScanNetworks::default();
        let mut pending = task::spawn(client.invoke_async(&scan));
        assert_pending!(pending.poll());

        assert!(client.cancel(transport.last().context));
        let outcome = assert_ready!(pending.poll()).unwrap();
        assert!(matches!(
            outcome,
            CommandOutcome::Transport(TransportFailure::Canceled)
        ));
    }

    #[test]
    fn test_read_fabrics_list() {
        let (client, transport) = client();
        let received = Arc::new(Mutex::new(None));
        let sink = received.clone();

        client
            .read_list_attribute::<FabricsList, _>(move |outcome| *sink.lock() = Some(outcome))
            .unwrap();
        let request = transport.last();
        assert_eq!(
            request.kind,
            RequestKind::ReadAttribute {
                attribute_id: operational_credentials::attributes::FABRICS_LIST
            }
        );

        let mut tw = TlvWriter::new();
        tw.start_array(&TlvTag::Anonymous).unwrap();
        tw.start_struct(&TlvTag::Anonymous).unwrap();
        tw.u8(&TlvTag::Context(0), 1).unwrap();
        tw.bytes(&TlvTag::Context(1), &[0x04; 65]).unwrap();
        tw.u16(&TlvTag::Context(2), 0xFFF1).unwrap();
        tw.u64(&TlvTag::Context(3), 0xAB).unwrap();
        tw.u64(&TlvTag::Context(4), 0x1122_3344_5566_7788).unwrap();
        tw.utf8(&TlvTag::Context(5), "home").unwrap();
        tw.end_container().unwrap();
        tw.end_container().unwrap();

        client
            .deliver(ResponseFrame::attribute(
                operational_credentials::CLUSTER_ID,
                operational_credentials::attributes::FABRICS_LIST,
                request.context,
                tw.finish().unwrap(),
            ))
            .unwrap();

        let Some(CommandOutcome::Success(list)) = received.lock().take() else {
            panic!("expected fabrics list");
        };
        assert_eq!(list.count, 1);
        assert_eq!(list.entries[0].fabric_index, 1);
        assert_eq!(list.entries[0].vendor_id, 0xFFF1);
        assert_eq!(list.entries[0].node_id, 0x1122_3344_5566_7788);
        assert_eq!(list.entries[0].label, "home");
    }

    #[tokio::test]
    async fn test_read_list_attribute_async_empty() {
        let (client, transport) = client();
        let mut pending = task::spawn(client.read_list_attribute_async::<BasicCommissioningInfoList>());
        assert_pending!(pending.poll());

        client
            .deliver(ResponseFrame::attribute(
                0x0030,
                0x0001,
                transport.last().context,
                vec![0x16, 0x18],
            ))
            .unwrap();

        let outcome = assert_ready!(pending.poll()).unwrap();
        assert_eq!(outcome, CommandOutcome::Success(ListAttribute::empty()));
    }

    #[test]
    fn test_bare_status_frame() {
        let (client, transport) = client();
        let received = Arc::new(Mutex::new(None));
        let sink = received.clone();
        client
            .invoke(&ScanNetworks::default(), move |outcome| {
                *sink.lock() = Some(outcome)
            })
            .unwrap();

        client
            .deliver(ResponseFrame::status(
                0x0031,
                transport.last().context,
                LegacyStatus::UnsupportedCluster as u8,
            ))
            .unwrap();

        let outcome = received.lock().take().unwrap();
        match outcome.into_result() {
            Err(CommandFailure::Status(failure)) => {
                assert_eq!(failure.status, StatusCode::legacy(0xC3))
            }
            other => panic!("expected status failure, got {:?}", other),
        }
    }

    #[test]
    fn test_wait_timeout_default() {
        assert_eq!(
            ClientConfig::default().response_timeout(),
            Duration::from_secs(30)
        );
    }
}
