//! Decode captured Matter response payloads against the builtin schemas.
//!
//! Usage:
//!   cargo run -- command --cluster 0x003E --command 0x03 <hex payload>
//!   cargo run -- attribute --cluster 0x003E --attribute 0x0004 <hex payload>
//!   cargo run -- schemas

use clap::{Parser, Subcommand};
use log::{error, info};
use matter_cluster_client::clusters::{
    SchemaTable, general_commissioning, network_commissioning, operational_credentials,
};
use matter_cluster_client::config::{Config, load_dotenv};
use matter_cluster_client::dispatch::{decode_list_attribute, decode_response};
use matter_cluster_client::{ClientError, CommandOutcome, Result};
use serde_json::{Value, json};

#[derive(Parser)]
#[command(name = "matter-response-decode")]
#[command(about = "Decode Matter cluster response payloads into JSON")]
struct Cli {
    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a cluster-specific response command
    Command {
        /// Cluster ID (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_id)]
        cluster: u32,

        /// Response command ID
        #[arg(long, value_parser = parse_id)]
        command: u32,

        /// Hex-encoded TLV payload
        payload: String,
    },
    /// Decode a list attribute report
    Attribute {
        /// Cluster ID (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_id)]
        cluster: u32,

        /// Attribute ID
        #[arg(long, value_parser = parse_id)]
        attribute: u32,

        /// Hex-encoded TLV payload
        payload: String,
    },
    /// List the builtin response and attribute schemas
    Schemas,
}

fn parse_id(s: &str) -> std::result::Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid id '{}': {}", s, e))
}

fn init_logger(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .init();
}

fn decode_hex(payload: &str) -> Result<Vec<u8>> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&cleaned).map_err(|e| ClientError::Config(format!("invalid hex payload: {}", e)))
}

fn decode_command(schemas: &SchemaTable, cluster_id: u32, command_id: u32, payload: &[u8]) -> Result<Value> {
    let schema = schemas
        .command(cluster_id, command_id)
        .ok_or(ClientError::UnknownCommand {
            cluster_id,
            command_id,
        })?;
    info!("Decoding {} ({} bytes)", schema.name, payload.len());

    let output = match decode_response(schema, payload)? {
        CommandOutcome::Success(fields) => json!({
            "response": schema.name,
            "outcome": "success",
            "fields": fields.to_json(),
        }),
        CommandOutcome::Status(failure) => json!({
            "response": schema.name,
            "outcome": "failure",
            "status": failure.status.value,
            "statusName": failure.status.legacy_status().map(|s| s.to_string()),
            "debugText": failure.debug_text,
        }),
        CommandOutcome::Transport(failure) => json!({
            "response": schema.name,
            "outcome": "transport",
            "error": failure.to_string(),
        }),
    };
    Ok(output)
}

fn decode_attribute(schemas: &SchemaTable, cluster_id: u32, attribute_id: u32, payload: &[u8]) -> Result<Value> {
    let schema = schemas
        .attribute(cluster_id, attribute_id)
        .ok_or(ClientError::UnknownAttribute {
            cluster_id,
            attribute_id,
        })?;
    info!("Decoding {} ({} bytes)", schema.name, payload.len());

    let list = decode_list_attribute(schema, payload)?;
    Ok(json!({
        "attribute": schema.name,
        "count": list.count,
        "entries": list.iter().map(|entry| entry.to_json()).collect::<Vec<_>>(),
    }))
}

fn list_schemas(schemas: &SchemaTable) -> Value {
    let clusters = [
        (
            "GeneralCommissioning",
            general_commissioning::CLUSTER_ID,
            general_commissioning::RESPONSES,
            general_commissioning::LIST_ATTRIBUTES,
        ),
        (
            "NetworkCommissioning",
            network_commissioning::CLUSTER_ID,
            network_commissioning::RESPONSES,
            network_commissioning::LIST_ATTRIBUTES,
        ),
        (
            "OperationalCredentials",
            operational_credentials::CLUSTER_ID,
            operational_credentials::RESPONSES,
            operational_credentials::LIST_ATTRIBUTES,
        ),
    ];

    let entries: Vec<Value> = clusters
        .iter()
        .map(|(name, cluster_id, responses, attributes)| {
            let commands: Vec<Value> = responses
                .iter()
                .filter(|(command_id, _)| schemas.command(*cluster_id, *command_id).is_some())
                .map(|(command_id, schema)| {
                    json!({
                        "id": format!("0x{:02X}", command_id),
                        "name": schema.name,
                        "fields": schema.fields.iter().map(|f| f.name).collect::<Vec<_>>(),
                    })
                })
                .collect();
            let lists: Vec<Value> = attributes
                .iter()
                .map(|(attribute_id, schema)| {
                    json!({"id": format!("0x{:04X}", attribute_id), "name": schema.name})
                })
                .collect();
            json!({
                "cluster": name,
                "id": format!("0x{:04X}", cluster_id),
                "responses": commands,
                "listAttributes": lists,
            })
        })
        .collect();
    Value::Array(entries)
}

fn run(cli: Cli) -> Result<()> {
    let schemas = SchemaTable::builtin();
    let output = match cli.command {
        Commands::Command {
            cluster,
            command,
            payload,
        } => decode_command(&schemas, cluster, command, &decode_hex(&payload)?)?,
        Commands::Attribute {
            cluster,
            attribute,
            payload,
        } => decode_attribute(&schemas, cluster, attribute, &decode_hex(&payload)?)?,
        Commands::Schemas => list_schemas(&schemas),
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);
    Ok(())
}

fn main() {
    load_dotenv();
    let config = match Config::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    init_logger(&config.logging.filter);

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
