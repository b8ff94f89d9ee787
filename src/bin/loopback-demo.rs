//! Loopback demo for the cluster client.
//!
//! Usage:
//!   cargo run --bin loopback-demo
//!
//! A simulated device answers requests arriving on a `ChannelTransport`.
//! Responses travel back over a second channel into `run_delivery_loop`,
//! the same way a real session layer would feed the client.

use log::{info, warn};
use matter_cluster_client::client::encode_request;
use matter_cluster_client::clusters::general_commissioning::{ArmFailSafe, BasicCommissioningInfoList};
use matter_cluster_client::clusters::network_commissioning::{self, RemoveNetwork, ScanNetworks};
use matter_cluster_client::clusters::operational_credentials::{
    self, CertificateChainRequest, CertificateType,
};
use matter_cluster_client::clusters::{SchemaTable, general_commissioning};
use matter_cluster_client::config::{Config, load_dotenv};
use matter_cluster_client::status::LegacyStatus;
use matter_cluster_client::tlv::{TlvError, TlvTag, TlvWriter};
use matter_cluster_client::transport::{
    ChannelTransport, RequestFrame, RequestKind, ResponseFrame, run_delivery_loop,
};
use matter_cluster_client::{ClusterClient, CommandOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Build the response a small Thread-capable device would send.
fn respond(request: &RequestFrame) -> Result<Option<ResponseFrame>, TlvError> {
    let context = request.context;
    let frame = match (request.cluster_id, request.kind) {
        (network_commissioning::CLUSTER_ID, RequestKind::Invoke { command_id })
            if command_id == network_commissioning::commands::SCAN_NETWORKS =>
        {
            let payload = encode_request(|tw| {
                tw.u8(&TlvTag::Context(0), 0)?;
                tw.utf8(&TlvTag::Context(1), "")?;
                tw.start_array(&TlvTag::Context(2))?;
                tw.end_container()?;
                tw.start_array(&TlvTag::Context(3))?;
                thread_network(tw, 0x1A2B, "living-room", 15, -58)?;
                thread_network(tw, 0x3C4D, "garage", 20, -81)?;
                tw.end_container()
            })?;
            ResponseFrame::command(
                network_commissioning::CLUSTER_ID,
                network_commissioning::response_commands::SCAN_NETWORKS_RESPONSE,
                context,
                payload,
            )
        }
        (network_commissioning::CLUSTER_ID, RequestKind::Invoke { command_id })
            if command_id == network_commissioning::commands::REMOVE_NETWORK =>
        {
            let payload = encode_request(|tw| {
                tw.u8(&TlvTag::Context(0), LegacyStatus::NotFound as u8)?;
                tw.utf8(&TlvTag::Context(1), "network not configured")
            })?;
            ResponseFrame::command(
                network_commissioning::CLUSTER_ID,
                network_commissioning::response_commands::REMOVE_NETWORK_RESPONSE,
                context,
                payload,
            )
        }
        (operational_credentials::CLUSTER_ID, RequestKind::Invoke { command_id })
            if command_id == operational_credentials::commands::CERTIFICATE_CHAIN_REQUEST =>
        {
            let certificate: Vec<u8> = (0..512u32).map(|i| (i % 256) as u8).collect();
            let payload = encode_request(|tw| tw.bytes(&TlvTag::Context(0), &certificate))?;
            ResponseFrame::command(
                operational_credentials::CLUSTER_ID,
                operational_credentials::response_commands::CERTIFICATE_CHAIN_RESPONSE,
                context,
                payload,
            )
        }
        (general_commissioning::CLUSTER_ID, RequestKind::ReadAttribute { attribute_id })
            if attribute_id == general_commissioning::attributes::BASIC_COMMISSIONING_INFO_LIST =>
        {
            let mut tw = TlvWriter::new();
            tw.start_array(&TlvTag::Anonymous)?;
            tw.start_struct(&TlvTag::Anonymous)?;
            tw.u32(&TlvTag::Context(0), 60_000)?;
            tw.end_container()?;
            tw.end_container()?;
            ResponseFrame::attribute(
                general_commissioning::CLUSTER_ID,
                attribute_id,
                context,
                tw.finish()?,
            )
        }
        // Everything else (ArmFailSafe included) goes unanswered so the caller times out.
        _ => return Ok(None),
    };
    Ok(Some(frame))
}

fn thread_network(
    tw: &mut TlvWriter,
    pan_id: u16,
    name: &str,
    channel: u16,
    rssi: i8,
) -> Result<(), TlvError> {
    tw.start_struct(&TlvTag::Anonymous)?;
    tw.u16(&TlvTag::Context(0), pan_id)?;
    tw.u64(&TlvTag::Context(1), (u64::from(pan_id) << 32) | 0xFEED)?;
    tw.utf8(&TlvTag::Context(2), name)?;
    tw.u16(&TlvTag::Context(3), channel)?;
    tw.u8(&TlvTag::Context(4), 4)?;
    tw.bytes(&TlvTag::Context(5), &pan_id.to_be_bytes().repeat(4))?;
    tw.i8(&TlvTag::Context(6), rssi)?;
    tw.u8(&TlvTag::Context(7), 3)?;
    tw.end_container()
}

/// Simulated device: answers each request on the response channel.
async fn run_device(mut requests: mpsc::Receiver<RequestFrame>, responses: mpsc::Sender<ResponseFrame>) {
    while let Some(request) = requests.recv().await {
        info!(
            "Device received request for cluster 0x{:04X} ({:?}) on {}",
            request.cluster_id, request.kind, request.context
        );
        match respond(&request) {
            Ok(Some(frame)) => {
                if responses.send(frame).await.is_err() {
                    warn!("Client went away");
                    break;
                }
            }
            Ok(None) => info!("Device ignoring {}", request.context),
            Err(e) => warn!("Device failed to encode response: {}", e),
        }
    }
}

fn main() {
    load_dotenv();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start tokio runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run());
}

async fn run() {
    let mut config = Config::from_env();
    // Keep the unanswered request short.
    config.client.response_timeout_ms = config.client.response_timeout_ms.min(2_000);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.filter.as_str()),
    )
    .format_timestamp_millis()
    .init();

    info!("Starting loopback demo");

    let (transport, requests) = ChannelTransport::new(config.client.channel_capacity);
    let (response_tx, response_rx) = mpsc::channel(config.client.channel_capacity);
    let client = Arc::new(ClusterClient::new(
        transport,
        Arc::new(SchemaTable::builtin()),
        config.client.clone(),
    ));

    let device_handle = tokio::spawn(run_device(requests, response_tx));
    let delivery_handle = tokio::spawn(run_delivery_loop(client.clone(), response_rx));

    match client.invoke_async(&ScanNetworks::default()).await {
        Ok(CommandOutcome::Success(scan)) => {
            info!(
                "Scan finished: {} WiFi, {} Thread network(s)",
                scan.wifi_scan_results.count, scan.thread_scan_results.count
            );
            for network in scan.thread_scan_results.iter() {
                info!(
                    "  {} pan=0x{:04X} channel={} rssi={}",
                    network.network_name, network.pan_id, network.channel, network.rssi
                );
            }
        }
        Ok(other) => warn!("Scan failed: {:?}", other),
        Err(e) => warn!("Scan not sent: {}", e),
    }

    let certificate_request = CertificateChainRequest {
        certificate_type: CertificateType::Dac,
    };
    match client.invoke_async(&certificate_request).await {
        Ok(CommandOutcome::Success(chain)) => {
            info!("Received DAC certificate ({} bytes)", chain.certificate.len())
        }
        Ok(other) => warn!("Certificate request failed: {:?}", other),
        Err(e) => warn!("Certificate request not sent: {}", e),
    }

    let remove = RemoveNetwork {
        network_id: b"office".to_vec(),
        breadcrumb: 1,
        timeout_ms: 0,
    };
    match client.invoke_async(&remove).await {
        Ok(CommandOutcome::Status(failure)) => info!("Remove network rejected: {}", failure),
        Ok(other) => warn!("Unexpected remove outcome: {:?}", other),
        Err(e) => warn!("Remove not sent: {}", e),
    }

    match client
        .read_list_attribute_async::<BasicCommissioningInfoList>()
        .await
    {
        Ok(CommandOutcome::Success(list)) => {
            for info in list.iter() {
                info!("Fail-safe expiry: {} ms", info.fail_safe_expiry_length_ms);
            }
        }
        Ok(other) => warn!("Attribute read failed: {:?}", other),
        Err(e) => warn!("Attribute read not sent: {}", e),
    }

    let arm = ArmFailSafe {
        expiry_length_seconds: 60,
        breadcrumb: 0,
        timeout_ms: 0,
    };
    match client.invoke_async(&arm).await {
        Ok(outcome) => info!("ArmFailSafe outcome: {:?}", outcome),
        Err(e) => warn!("ArmFailSafe not sent: {}", e),
    }

    // Dropping the device closes the response channel and ends the delivery loop.
    device_handle.abort();
    if let Err(e) = delivery_handle.await {
        warn!("Delivery loop ended abnormally: {}", e);
    }
    info!(
        "Loopback demo finished, {} request(s) still pending",
        client.registry().live_count()
    );
}
