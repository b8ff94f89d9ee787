//! Cluster response schemas and typed cluster commands.
//!
//! Each cluster module declares its response shapes as static
//! [`ResponseSchema`]s (ordered field specs, optional status field) and its
//! list attributes as [`AttributeSchema`]s. The [`SchemaTable`] maps
//! (cluster, response command) and (cluster, attribute) to those schemas and
//! drives the generic decode path in [`crate::dispatch`].
//!
//! Typed requests implement [`ClusterCommand`]; typed responses implement
//! [`ClusterResponse`] on top of the decoded [`ResponseFields`].

use crate::dispatch::{DecodedValue, ResponseFields};
use crate::status::StatusConvention;
use crate::tlv::{ListAttribute, TlvError, TlvWriter};
use std::collections::HashMap;

pub mod general_commissioning;
pub mod network_commissioning;
pub mod operational_credentials;

/// Wire shape of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Unsigned,
    Signed,
    Bool,
    Utf8,
    Bytes,
    Struct(&'static [FieldSpec]),
    List(&'static FieldKind),
}

/// One context-tagged field of a response or structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub tag: u8,
    pub name: &'static str,
    pub kind: FieldKind,
    pub optional: bool,
}

impl FieldSpec {
    pub const fn required(tag: u8, name: &'static str, kind: FieldKind) -> Self {
        Self {
            tag,
            name,
            kind,
            optional: false,
        }
    }

    pub const fn optional(tag: u8, name: &'static str, kind: FieldKind) -> Self {
        Self {
            tag,
            name,
            kind,
            optional: true,
        }
    }
}

/// Field carrying the response's status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusField {
    pub tag: u8,
    pub convention: StatusConvention,
    /// Tag of the accompanying debug text (UTF-8 or byte span).
    pub debug_text: Option<u8>,
}

/// Decode routine for one response command.
#[derive(Debug, Clone, Copy)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    pub status: Option<StatusField>,
}

/// Decode routine for one list attribute.
#[derive(Debug, Clone, Copy)]
pub struct AttributeSchema {
    pub name: &'static str,
    pub entry: FieldKind,
}

/// Read-only lookup from (cluster, command/attribute) to schema.
#[derive(Debug, Default)]
pub struct SchemaTable {
    commands: HashMap<(u32, u32), &'static ResponseSchema>,
    attributes: HashMap<(u32, u32), &'static AttributeSchema>,
}

impl SchemaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every cluster shipped in this crate.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (cluster_id, responses, attributes) in [
            (
                general_commissioning::CLUSTER_ID,
                general_commissioning::RESPONSES,
                general_commissioning::LIST_ATTRIBUTES,
            ),
            (
                network_commissioning::CLUSTER_ID,
                network_commissioning::RESPONSES,
                network_commissioning::LIST_ATTRIBUTES,
            ),
            (
                operational_credentials::CLUSTER_ID,
                operational_credentials::RESPONSES,
                operational_credentials::LIST_ATTRIBUTES,
            ),
        ] {
            for (command_id, schema) in responses {
                table = table.with_command(cluster_id, *command_id, *schema);
            }
            for (attribute_id, schema) in attributes {
                table = table.with_attribute(cluster_id, *attribute_id, *schema);
            }
        }
        table
    }

    pub fn with_command(
        mut self,
        cluster_id: u32,
        command_id: u32,
        schema: &'static ResponseSchema,
    ) -> Self {
        self.commands.insert((cluster_id, command_id), schema);
        self
    }

    pub fn with_attribute(
        mut self,
        cluster_id: u32,
        attribute_id: u32,
        schema: &'static AttributeSchema,
    ) -> Self {
        self.attributes.insert((cluster_id, attribute_id), schema);
        self
    }

    pub fn command(&self, cluster_id: u32, command_id: u32) -> Option<&'static ResponseSchema> {
        self.commands.get(&(cluster_id, command_id)).copied()
    }

    pub fn attribute(&self, cluster_id: u32, attribute_id: u32) -> Option<&'static AttributeSchema> {
        self.attributes.get(&(cluster_id, attribute_id)).copied()
    }
}

/// A typed request command.
pub trait ClusterCommand {
    const CLUSTER_ID: u32;
    const COMMAND_ID: u32;
    type Response: ClusterResponse;

    /// Write the command fields. The enclosing anonymous structure is written by the caller.
    fn encode(&self, tw: &mut TlvWriter) -> Result<(), TlvError>;
}

/// A typed view over decoded response fields.
pub trait ClusterResponse: Sized + Send + 'static {
    fn from_fields(fields: &ResponseFields) -> Result<Self, TlvError>;
}

impl ClusterResponse for ResponseFields {
    fn from_fields(fields: &ResponseFields) -> Result<Self, TlvError> {
        Ok(fields.clone())
    }
}

/// Commands answered by a bare status carry no response data.
impl ClusterResponse for () {
    fn from_fields(_fields: &ResponseFields) -> Result<Self, TlvError> {
        Ok(())
    }
}

/// A typed list attribute.
pub trait ListAttributeSpec {
    const CLUSTER_ID: u32;
    const ATTRIBUTE_ID: u32;
    type Entry: FromDecoded + Send + 'static;
}

/// Conversion from a decoded value (list entries, nested structures).
pub trait FromDecoded: Sized {
    fn from_decoded(value: &DecodedValue) -> Result<Self, TlvError>;
}

impl FromDecoded for Vec<u8> {
    fn from_decoded(value: &DecodedValue) -> Result<Self, TlvError> {
        value.as_bytes().map(<[u8]>::to_vec)
    }
}

impl FromDecoded for String {
    fn from_decoded(value: &DecodedValue) -> Result<Self, TlvError> {
        value.as_str().map(str::to_string)
    }
}

/// Response carrying only an error code and debug text.
///
/// The dispatcher routes non-zero codes to the failure path, so a decoded
/// value always has `error_code == 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTextResponse {
    pub error_code: u8,
    pub debug_text: String,
}

impl ClusterResponse for StatusTextResponse {
    fn from_fields(fields: &ResponseFields) -> Result<Self, TlvError> {
        Ok(Self {
            error_code: fields.required(0)?.as_u8()?,
            debug_text: optional_text(fields, 1),
        })
    }
}

/// Debug text at `tag`, empty when absent. Byte spans are read as lossy UTF-8.
pub(crate) fn optional_text(fields: &ResponseFields, tag: u8) -> String {
    fields
        .get(tag)
        .and_then(DecodedValue::to_text_lossy)
        .unwrap_or_default()
}

/// List field at `tag`, converted entry by entry. An absent list has a count of zero.
pub(crate) fn optional_list<T: FromDecoded>(
    fields: &ResponseFields,
    tag: u8,
) -> Result<ListAttribute<T>, TlvError> {
    match fields.get(tag) {
        Some(value) => value.as_list()?.try_map(T::from_decoded),
        None => Ok(ListAttribute::empty()),
    }
}

/// Fields shared by every status-and-debug-text response: errorCode (0), debugText (1).
pub(crate) const STATUS_TEXT_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(0, "errorCode", FieldKind::Unsigned),
    FieldSpec::optional(1, "debugText", FieldKind::Utf8),
];

pub(crate) const LEGACY_STATUS: Option<StatusField> = Some(StatusField {
    tag: 0,
    convention: StatusConvention::Legacy,
    debug_text: Some(1),
});

/// Write the breadcrumb/timeout pair most commissioning commands end with.
pub(crate) fn encode_breadcrumb(
    tw: &mut TlvWriter,
    breadcrumb_tag: u8,
    breadcrumb: u64,
    timeout_ms: u32,
) -> Result<(), TlvError> {
    use crate::tlv::TlvTag;
    tw.u64(&TlvTag::Context(breadcrumb_tag), breadcrumb)?;
    tw.u32(&TlvTag::Context(breadcrumb_tag + 1), timeout_ms)
}
