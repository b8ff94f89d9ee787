use super::fields::{DecodedField, DecodedValue, ResponseFields, decode_payload, decode_value};
use crate::callback::{CallbackRegistry, CommandOutcome, ContextHandle, StatusFailure};
use crate::clusters::{AttributeSchema, ResponseSchema, SchemaTable};
use crate::error::{ClientError, Result};
use crate::status::{LegacyStatus, StatusCode};
use crate::tlv::{ListAttribute, TlvError, TlvReader, read_list};
use log::{debug, warn};
use std::sync::Arc;

/// Decode `payload` against `schema` and split on its status field.
///
/// A non-zero status yields [`CommandOutcome::Status`] with the debug text
/// the response carried; anything else is [`CommandOutcome::Success`].
pub fn decode_response(
    schema: &ResponseSchema,
    payload: &[u8],
) -> std::result::Result<CommandOutcome, TlvError> {
    let fields = decode_payload(payload, schema.fields)?;

    let Some(status_field) = schema.status else {
        return Ok(CommandOutcome::Success(fields));
    };
    let Some(value) = fields.get(status_field.tag) else {
        return Ok(CommandOutcome::Success(fields));
    };
    let status = StatusCode {
        value: value.as_u8()?,
        convention: status_field.convention,
    };
    if status.is_success() {
        return Ok(CommandOutcome::Success(fields));
    }

    let debug_text = status_field
        .debug_text
        .and_then(|tag| fields.get(tag))
        .and_then(DecodedValue::to_text_lossy)
        .filter(|text| !text.is_empty());
    Ok(CommandOutcome::Status(StatusFailure::new(status, debug_text)))
}

/// Decode a list attribute report: a single anonymous array of entries.
pub fn decode_list_attribute(
    schema: &AttributeSchema,
    payload: &[u8],
) -> std::result::Result<ListAttribute<DecodedValue>, TlvError> {
    let mut reader = TlvReader::new(payload);
    let list = read_list(&mut reader, |items, entry| {
        decode_value(items, entry, &schema.entry)
    })?;
    if reader.next()?.is_some() {
        return Err(TlvError::MalformedEncoding("trailing data after attribute"));
    }
    Ok(list)
}

/// Routes decoded responses to the callbacks waiting on their context.
pub struct ResponseDispatcher {
    schemas: Arc<SchemaTable>,
    registry: Arc<CallbackRegistry>,
}

impl ResponseDispatcher {
    pub fn new(schemas: Arc<SchemaTable>, registry: Arc<CallbackRegistry>) -> Self {
        Self { schemas, registry }
    }

    pub fn schemas(&self) -> &SchemaTable {
        &self.schemas
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Decode a command response and resolve `context` with it.
    ///
    /// Without a schema for the pair nothing is resolved and the context
    /// stays live. A payload that fails to decode resolves the context with
    /// a synthetic [`LegacyStatus::Failure`] and the decode error is returned.
    pub fn dispatch(
        &self,
        cluster_id: u32,
        command_id: u32,
        context: ContextHandle,
        payload: &[u8],
    ) -> Result<()> {
        let Some(schema) = self.schemas.command(cluster_id, command_id) else {
            warn!(
                "No response schema for cluster 0x{:04X} command 0x{:02X} ({})",
                cluster_id, command_id, context
            );
            return Err(ClientError::UnknownCommand {
                cluster_id,
                command_id,
            });
        };

        debug!("Decoding {} for {} ({} bytes)", schema.name, context, payload.len());
        match decode_response(schema, payload) {
            Ok(outcome) => self.resolve(context, outcome),
            Err(e) => self.fail_decode(context, schema.name, e),
        }
    }

    /// Decode a list attribute report and resolve `context` with a single list field.
    pub fn dispatch_attribute(
        &self,
        cluster_id: u32,
        attribute_id: u32,
        context: ContextHandle,
        payload: &[u8],
    ) -> Result<()> {
        let Some(schema) = self.schemas.attribute(cluster_id, attribute_id) else {
            warn!(
                "No list attribute schema for cluster 0x{:04X} attribute 0x{:04X} ({})",
                cluster_id, attribute_id, context
            );
            return Err(ClientError::UnknownAttribute {
                cluster_id,
                attribute_id,
            });
        };

        match decode_list_attribute(schema, payload) {
            Ok(list) => {
                debug!("Decoded {} with {} entries for {}", schema.name, list.count, context);
                let fields = ResponseFields::new(vec![DecodedField {
                    tag: 0,
                    name: schema.name,
                    value: DecodedValue::List(list),
                }]);
                self.registry.resolve_success(context, fields)
            }
            Err(e) => self.fail_decode(context, schema.name, e),
        }
    }

    /// Resolve `context` from a bare status, for commands answered without a payload.
    pub fn dispatch_status(&self, context: ContextHandle, status: StatusCode) -> Result<()> {
        if status.is_success() {
            self.registry
                .resolve_success(context, ResponseFields::default())
        } else {
            self.registry.resolve_failure(context, status, None)
        }
    }

    fn resolve(&self, context: ContextHandle, outcome: CommandOutcome) -> Result<()> {
        match outcome {
            CommandOutcome::Success(fields) => self.registry.resolve_success(context, fields),
            CommandOutcome::Status(failure) => {
                debug!("{} failed with {}", context, failure);
                self.registry
                    .resolve_failure(context, failure.status, failure.debug_text)
            }
            CommandOutcome::Transport(failure) => {
                self.registry.resolve_transport_failure(context, failure)
            }
        }
    }

    fn fail_decode(&self, context: ContextHandle, name: &str, error: TlvError) -> Result<()> {
        warn!("Failed to decode {} for {}: {}", name, context, error);
        if let Err(e) = self.registry.resolve_failure(
            context,
            LegacyStatus::Failure.into(),
            Some(error.to_string()),
        ) {
            warn!("Decode failure for {} not delivered: {}", context, e);
        }
        Err(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{CommandFailure, ContextState};
    use crate::clusters::ClusterResponse;
    use crate::clusters::network_commissioning::{self, ScanNetworksResponse};
    use crate::clusters::{general_commissioning, operational_credentials};
    use crate::tlv::{TlvTag, TlvWriter};
    use parking_lot::Mutex;

    type Seen = Arc<Mutex<Vec<CommandOutcome>>>;

    fn dispatcher() -> ResponseDispatcher {
        ResponseDispatcher::new(
            Arc::new(SchemaTable::builtin()),
            Arc::new(CallbackRegistry::new()),
        )
    }

    fn register(dispatcher: &ResponseDispatcher) -> (ContextHandle, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let context = dispatcher.registry().allocate();
        dispatcher
            .registry()
            .register_outcome(context, move |outcome| sink.lock().push(outcome))
            .unwrap();
        (context, seen)
    }

    fn response(build: impl FnOnce(&mut TlvWriter) -> std::result::Result<(), TlvError>) -> Vec<u8> {
        let mut tw = TlvWriter::new();
        tw.start_struct(&TlvTag::Anonymous).unwrap();
        build(&mut tw).unwrap();
        tw.end_container().unwrap();
        tw.finish().unwrap()
    }

    fn thread_entry(tw: &mut TlvWriter, pan_id: u16, channel: u16) -> std::result::Result<(), TlvError> {
        tw.start_struct(&TlvTag::Anonymous)?;
        tw.u16(&TlvTag::Context(0), pan_id)?;
        tw.u64(&TlvTag::Context(1), 0x0011_2233_4455_6677)?;
        tw.utf8(&TlvTag::Context(2), "OpenThread")?;
        tw.u16(&TlvTag::Context(3), channel)?;
        tw.u8(&TlvTag::Context(4), 2)?;
        tw.bytes(&TlvTag::Context(5), &[0xAA; 8])?;
        tw.i8(&TlvTag::Context(6), -40)?;
        tw.u8(&TlvTag::Context(7), 255)?;
        tw.end_container()
    }

    #[test]
    fn test_scan_networks_counts_and_order() {
        let dispatcher = dispatcher();
        let (context, seen) = register(&dispatcher);
        let payload = response(|tw| {
            tw.u8(&TlvTag::Context(0), 0)?;
            tw.utf8(&TlvTag::Context(1), "")?;
            tw.start_array(&TlvTag::Context(2))?;
            tw.end_container()?;
            tw.start_array(&TlvTag::Context(3))?;
            thread_entry(tw, 0x1111, 11)?;
            thread_entry(tw, 0x2222, 26)?;
            tw.end_container()
        });

        dispatcher
            .dispatch(
                network_commissioning::CLUSTER_ID,
                network_commissioning::response_commands::SCAN_NETWORKS_RESPONSE,
                context,
                &payload,
            )
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let CommandOutcome::Success(fields) = &seen[0] else {
            panic!("expected success, got {:?}", seen[0]);
        };
        let scan = ScanNetworksResponse::from_fields(fields).unwrap();
        assert_eq!(
            (scan.wifi_scan_results.count, scan.thread_scan_results.count),
            (0, 2)
        );
        let pans: Vec<u16> = scan.thread_scan_results.iter().map(|r| r.pan_id).collect();
        assert_eq!(pans, vec![0x1111, 0x2222]);
        assert_eq!(scan.thread_scan_results.entries[1].channel, 26);
        assert_eq!(dispatcher.registry().state(context), ContextState::Retired);
    }

    #[test]
    fn test_certificate_chain_delivers_exact_bytes() {
        let dispatcher = dispatcher();
        let (context, seen) = register(&dispatcher);
        let certificate: Vec<u8> = (0..512u32).map(|i| (i * 7 % 256) as u8).collect();
        let payload = response(|tw| tw.bytes(&TlvTag::Context(0), &certificate));

        dispatcher
            .dispatch(
                operational_credentials::CLUSTER_ID,
                operational_credentials::response_commands::CERTIFICATE_CHAIN_RESPONSE,
                context,
                &payload,
            )
            .unwrap();

        let seen = seen.lock();
        let CommandOutcome::Success(fields) = &seen[0] else {
            panic!("expected success");
        };
        let delivered = fields.by_name("certificate").unwrap().as_bytes().unwrap();
        assert_eq!(delivered.len(), 512);
        // body starts after struct (1), control (1), tag (1) and 2-byte length
        assert_eq!(delivered, &payload[5..5 + 512]);
    }

    #[test]
    fn test_unknown_command_leaves_context_live() {
        let dispatcher = dispatcher();
        let (context, seen) = register(&dispatcher);
        let payload = response(|tw| tw.u8(&TlvTag::Context(0), 0));

        let result = dispatcher.dispatch(0x0006, 0x01, context, &payload);
        assert!(matches!(
            result,
            Err(ClientError::UnknownCommand {
                cluster_id: 0x0006,
                command_id: 0x01
            })
        ));
        assert!(dispatcher.registry().is_live(context));
        assert!(seen.lock().is_empty());

        let payload = response(|tw| {
            tw.u8(&TlvTag::Context(0), 0)?;
            tw.utf8(&TlvTag::Context(1), "")
        });
        dispatcher
            .dispatch(
                general_commissioning::CLUSTER_ID,
                general_commissioning::response_commands::ARM_FAIL_SAFE_RESPONSE,
                context,
                &payload,
            )
            .unwrap();
        assert!(seen.lock()[0].is_success());
    }

    #[test]
    fn test_non_success_status_routes_to_failure() {
        let dispatcher = dispatcher();
        let context = dispatcher.registry().allocate();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        dispatcher
            .registry()
            .register(
                context,
                |_| panic!("success must not fire"),
                move |failure| sink.lock().push(failure),
            )
            .unwrap();

        let payload = response(|tw| {
            tw.u8(&TlvTag::Context(0), LegacyStatus::NotFound as u8)?;
            tw.utf8(&TlvTag::Context(1), "network not configured")
        });
        dispatcher
            .dispatch(
                network_commissioning::CLUSTER_ID,
                network_commissioning::response_commands::REMOVE_NETWORK_RESPONSE,
                context,
                &payload,
            )
            .unwrap();

        assert_eq!(
            *failures.lock(),
            vec![CommandFailure::Status(StatusFailure::new(
                StatusCode::legacy(0x8B),
                Some("network not configured".to_string())
            ))]
        );
    }

    #[test]
    fn test_cluster_specific_status_keeps_convention() {
        let dispatcher = dispatcher();
        let (context, seen) = register(&dispatcher);
        let payload = response(|tw| {
            tw.u8(&TlvTag::Context(0), 0x09)?;
            tw.bytes(&TlvTag::Context(2), b"fabric conflict")
        });

        dispatcher
            .dispatch(
                operational_credentials::CLUSTER_ID,
                operational_credentials::response_commands::NOC_RESPONSE,
                context,
                &payload,
            )
            .unwrap();

        let seen = seen.lock();
        let CommandOutcome::Status(failure) = &seen[0] else {
            panic!("expected status failure");
        };
        assert_eq!(failure.status, StatusCode::cluster_specific(0x09));
        assert_eq!(failure.status.legacy_status(), None);
        assert_eq!(failure.debug_text.as_deref(), Some("fabric conflict"));
    }

    #[test]
    fn test_decode_error_resolves_synthetic_failure() {
        let dispatcher = dispatcher();
        let (context, seen) = register(&dispatcher);
        let mut payload = response(|tw| tw.utf8(&TlvTag::Context(1), "no error code"));
        payload.truncate(payload.len() - 1);

        let result = dispatcher.dispatch(
            general_commissioning::CLUSTER_ID,
            general_commissioning::response_commands::COMMISSIONING_COMPLETE_RESPONSE,
            context,
            &payload,
        );
        assert!(matches!(result, Err(ClientError::Tlv(TlvError::MalformedEncoding(_)))));

        let seen = seen.lock();
        let CommandOutcome::Status(failure) = &seen[0] else {
            panic!("expected status failure");
        };
        assert_eq!(failure.status.legacy_status(), Some(LegacyStatus::Failure));
        assert!(failure.debug_text.is_some());
    }

    #[test]
    fn test_decode_error_for_canceled_context_still_reported() {
        let dispatcher = dispatcher();
        let (context, seen) = register(&dispatcher);
        assert!(dispatcher.registry().cancel(context));

        let result = dispatcher.dispatch(
            general_commissioning::CLUSTER_ID,
            general_commissioning::response_commands::ARM_FAIL_SAFE_RESPONSE,
            context,
            &[0x15, 0x24, 0x00],
        );
        assert!(matches!(result, Err(ClientError::Tlv(TlvError::MalformedEncoding(_)))));
        assert!(seen.lock().is_empty());
        assert_eq!(dispatcher.registry().state(context), ContextState::Retired);
    }

    #[test]
    fn test_truncated_final_list_entry_fails_whole_list() {
        let dispatcher = dispatcher();
        let (context, seen) = register(&dispatcher);

        let mut tw = TlvWriter::new();
        tw.start_array(&TlvTag::Anonymous).unwrap();
        tw.bytes(&TlvTag::Anonymous, &[1; 4]).unwrap();
        tw.bytes(&TlvTag::Anonymous, &[2; 4]).unwrap();
        tw.end_container().unwrap();
        let mut payload = tw.finish().unwrap();
        // cut the second certificate mid-value
        payload.truncate(payload.len() - 3);

        let result = dispatcher.dispatch_attribute(
            operational_credentials::CLUSTER_ID,
            operational_credentials::attributes::TRUSTED_ROOT_CERTIFICATES,
            context,
            &payload,
        );
        assert!(result.is_err());

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], CommandOutcome::Status(_)));
    }

    #[test]
    fn test_list_attribute_resolves_single_list_field() {
        let dispatcher = dispatcher();
        let (context, seen) = register(&dispatcher);

        let mut tw = TlvWriter::new();
        tw.start_array(&TlvTag::Anonymous).unwrap();
        tw.start_struct(&TlvTag::Anonymous).unwrap();
        tw.u32(&TlvTag::Context(0), 60_000).unwrap();
        tw.end_container().unwrap();
        tw.end_container().unwrap();
        let payload = tw.finish().unwrap();

        dispatcher
            .dispatch_attribute(
                general_commissioning::CLUSTER_ID,
                general_commissioning::attributes::BASIC_COMMISSIONING_INFO_LIST,
                context,
                &payload,
            )
            .unwrap();

        let seen = seen.lock();
        let CommandOutcome::Success(fields) = &seen[0] else {
            panic!("expected success");
        };
        let list = fields.required(0).unwrap().as_list().unwrap();
        assert_eq!(list.count, 1);
    }

    #[test]
    fn test_unknown_attribute() {
        let dispatcher = dispatcher();
        let (context, _seen) = register(&dispatcher);
        assert!(matches!(
            dispatcher.dispatch_attribute(0x003E, 0x0002, context, &[0x16, 0x18]),
            Err(ClientError::UnknownAttribute { .. })
        ));
        assert!(dispatcher.registry().is_live(context));
    }

    #[test]
    fn test_bare_status_bridge() {
        let dispatcher = dispatcher();
        let (ok, ok_seen) = register(&dispatcher);
        let (bad, bad_seen) = register(&dispatcher);

        dispatcher
            .dispatch_status(ok, LegacyStatus::Success.into())
            .unwrap();
        dispatcher
            .dispatch_status(bad, LegacyStatus::UnsupCommand.into())
            .unwrap();

        assert_eq!(
            ok_seen.lock()[0],
            CommandOutcome::Success(ResponseFields::default())
        );
        assert_eq!(
            bad_seen.lock()[0],
            CommandOutcome::Status(StatusFailure::new(StatusCode::legacy(0x81), None))
        );
    }

    #[test]
    fn test_stale_delivery_is_unknown_context() {
        let dispatcher = dispatcher();
        let (context, seen) = register(&dispatcher);
        let payload = response(|tw| tw.u8(&TlvTag::Context(0), 0));
        let deliver = || {
            dispatcher.dispatch(
                general_commissioning::CLUSTER_ID,
                general_commissioning::response_commands::ARM_FAIL_SAFE_RESPONSE,
                context,
                &payload,
            )
        };

        deliver().unwrap();
        assert!(matches!(deliver(), Err(ClientError::UnknownContext(_))));
        assert_eq!(seen.lock().len(), 1);
    }
}
