//! Schema-driven field decoding.
//!
//! Response payloads are a top-level anonymous structure of context-tagged
//! fields. Fields are matched to the schema by tag; unknown tags are skipped
//! so newer devices can add fields.

use crate::clusters::{FieldKind, FieldSpec};
use crate::tlv::{
    Element, ElementType, ListAttribute, TlvError, TlvReader, TlvTag, Value, decode_list,
};
use log::debug;
use serde_json::{Map, Value as JsonValue, json};

/// An owned decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Unsigned(u64),
    Signed(i64),
    Bool(bool),
    Utf8(String),
    Bytes(Vec<u8>),
    Struct(ResponseFields),
    List(ListAttribute<DecodedValue>),
}

/// One decoded field.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub tag: u8,
    pub name: &'static str,
    pub value: DecodedValue,
}

/// Decoded fields of a response (or of a structured list entry), in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseFields {
    fields: Vec<DecodedField>,
}

impl DecodedValue {
    pub fn element_type(&self) -> ElementType {
        match self {
            DecodedValue::Unsigned(_) => ElementType::UnsignedInteger,
            DecodedValue::Signed(_) => ElementType::SignedInteger,
            DecodedValue::Bool(_) => ElementType::Boolean,
            DecodedValue::Utf8(_) => ElementType::Utf8String,
            DecodedValue::Bytes(_) => ElementType::ByteString,
            DecodedValue::Struct(_) => ElementType::Structure,
            DecodedValue::List(_) => ElementType::Array,
        }
    }

    fn mismatch(&self, expected: &'static str) -> TlvError {
        TlvError::TypeMismatch {
            expected,
            found: self.element_type(),
        }
    }

    pub fn as_u64(&self) -> Result<u64, TlvError> {
        match self {
            DecodedValue::Unsigned(v) => Ok(*v),
            _ => Err(self.mismatch("unsigned integer")),
        }
    }

    pub fn as_u32(&self) -> Result<u32, TlvError> {
        u32::try_from(self.as_u64()?).map_err(|_| self.mismatch("u32"))
    }

    pub fn as_u16(&self) -> Result<u16, TlvError> {
        u16::try_from(self.as_u64()?).map_err(|_| self.mismatch("u16"))
    }

    pub fn as_u8(&self) -> Result<u8, TlvError> {
        u8::try_from(self.as_u64()?).map_err(|_| self.mismatch("u8"))
    }

    pub fn as_i64(&self) -> Result<i64, TlvError> {
        match self {
            DecodedValue::Signed(v) => Ok(*v),
            _ => Err(self.mismatch("signed integer")),
        }
    }

    pub fn as_i8(&self) -> Result<i8, TlvError> {
        i8::try_from(self.as_i64()?).map_err(|_| self.mismatch("i8"))
    }

    pub fn as_bool(&self) -> Result<bool, TlvError> {
        match self {
            DecodedValue::Bool(v) => Ok(*v),
            _ => Err(self.mismatch("boolean")),
        }
    }

    pub fn as_str(&self) -> Result<&str, TlvError> {
        match self {
            DecodedValue::Utf8(v) => Ok(v),
            _ => Err(self.mismatch("UTF-8 string")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], TlvError> {
        match self {
            DecodedValue::Bytes(v) => Ok(v),
            _ => Err(self.mismatch("byte string")),
        }
    }

    pub fn as_struct(&self) -> Result<&ResponseFields, TlvError> {
        match self {
            DecodedValue::Struct(v) => Ok(v),
            _ => Err(self.mismatch("structure")),
        }
    }

    pub fn as_list(&self) -> Result<&ListAttribute<DecodedValue>, TlvError> {
        match self {
            DecodedValue::List(v) => Ok(v),
            _ => Err(self.mismatch("array")),
        }
    }

    /// Text for a debug-text field, which some clusters send as a byte span.
    pub fn to_text_lossy(&self) -> Option<String> {
        match self {
            DecodedValue::Utf8(text) => Some(text.clone()),
            DecodedValue::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// JSON rendering for tooling. Byte strings become lowercase hex.
    pub fn to_json(&self) -> JsonValue {
        match self {
            DecodedValue::Unsigned(v) => json!(v),
            DecodedValue::Signed(v) => json!(v),
            DecodedValue::Bool(v) => json!(v),
            DecodedValue::Utf8(v) => json!(v),
            DecodedValue::Bytes(v) => json!(hex::encode(v)),
            DecodedValue::Struct(fields) => fields.to_json(),
            DecodedValue::List(list) => json!({
                "count": list.count,
                "entries": list.iter().map(DecodedValue::to_json).collect::<Vec<_>>(),
            }),
        }
    }
}

impl ResponseFields {
    pub fn new(fields: Vec<DecodedField>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DecodedField> {
        self.fields.iter()
    }

    pub fn get(&self, tag: u8) -> Option<&DecodedValue> {
        self.fields.iter().find(|f| f.tag == tag).map(|f| &f.value)
    }

    pub fn by_name(&self, name: &str) -> Option<&DecodedValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Field `tag`, failing if the response did not carry it.
    pub fn required(&self, tag: u8) -> Result<&DecodedValue, TlvError> {
        self.get(tag)
            .ok_or(TlvError::MalformedEncoding("missing required field"))
    }

    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.value.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}

/// Decode a complete response payload against `specs`.
///
/// An empty payload is accepted only when no field is required.
pub fn decode_payload(payload: &[u8], specs: &'static [FieldSpec]) -> Result<ResponseFields, TlvError> {
    if payload.is_empty() {
        if specs.iter().any(|s| !s.optional) {
            return Err(TlvError::MalformedEncoding("empty response payload"));
        }
        return Ok(ResponseFields::default());
    }

    let mut reader = TlvReader::new(payload);
    let element = reader.expect_next()?;
    if !matches!(element.value, Value::Structure) {
        return Err(element.mismatch("structure"));
    }
    let mut inner = reader.enter()?;
    let fields = decode_fields(&mut inner, specs)?;
    reader.exit(inner)?;

    if reader.next()?.is_some() {
        return Err(TlvError::MalformedEncoding("trailing data after response"));
    }
    Ok(fields)
}

/// Decode the members of an entered structure against `specs`.
pub fn decode_fields<'a>(
    reader: &mut TlvReader<'a>,
    specs: &'static [FieldSpec],
) -> Result<ResponseFields, TlvError> {
    let mut fields: Vec<DecodedField> = Vec::with_capacity(specs.len());

    while let Some(element) = reader.next()? {
        let TlvTag::Context(tag) = element.tag else {
            debug!("Skipping non-context tag {:?}", element.tag);
            continue;
        };
        let Some(spec) = specs.iter().find(|s| s.tag == tag) else {
            debug!("Skipping unknown field tag {}", tag);
            continue;
        };
        if fields.iter().any(|f| f.tag == tag) {
            return Err(TlvError::MalformedEncoding("duplicate field"));
        }
        if element.is_null() && spec.optional {
            continue;
        }
        let value = decode_value(reader, element, &spec.kind)?;
        fields.push(DecodedField {
            tag,
            name: spec.name,
            value,
        });
    }

    if specs
        .iter()
        .any(|s| !s.optional && !fields.iter().any(|f| f.tag == s.tag))
    {
        return Err(TlvError::MalformedEncoding("missing required field"));
    }

    fields.sort_by_key(|f| specs.iter().position(|s| s.tag == f.tag));
    Ok(ResponseFields { fields })
}

/// Decode one element as `kind`. Structures and lists are entered through `reader`.
pub fn decode_value<'a>(
    reader: &mut TlvReader<'a>,
    element: Element<'a>,
    kind: &FieldKind,
) -> Result<DecodedValue, TlvError> {
    let value = match *kind {
        FieldKind::Unsigned => DecodedValue::Unsigned(element.u64()?),
        FieldKind::Signed => DecodedValue::Signed(element.i64()?),
        FieldKind::Bool => DecodedValue::Bool(element.bool()?),
        FieldKind::Utf8 => DecodedValue::Utf8(element.utf8()?.to_string()),
        FieldKind::Bytes => DecodedValue::Bytes(element.bytes()?.to_vec()),
        FieldKind::Struct(specs) => {
            if !matches!(element.value, Value::Structure) {
                return Err(element.mismatch("structure"));
            }
            let mut inner = reader.enter()?;
            let fields = decode_fields(&mut inner, specs)?;
            reader.exit(inner)?;
            DecodedValue::Struct(fields)
        }
        FieldKind::List(entry_kind) => DecodedValue::List(decode_list(
            reader,
            &element,
            |items, entry| decode_value(items, entry, entry_kind),
        )?),
    };
    Ok(value)
}
