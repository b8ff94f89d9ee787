//! Matter TLV encoding.
//!
//! Every element starts with a control byte: the upper 3 bits select the tag
//! form, the lower 5 bits the element type. Tags, lengths and values follow
//! in little-endian order. Containers (structure, array, list) carry no
//! length and are closed by an end-of-container element.
//!
//! ## Control byte
//! ```text
//!  7 6 5 | 4 3 2 1 0
//!  tag   | element type
//! ```

mod list;
mod reader;
mod writer;

pub use list::{ListAttribute, decode_list, read_list};
pub use reader::{Element, TlvReader, Value};
pub use writer::TlvWriter;

use strum::{Display, FromRepr};
use thiserror::Error;

/// Errors raised while reading or writing TLV.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlvError {
    /// Buffer truncated, length inconsistent, or containers badly nested.
    #[error("malformed TLV encoding: {0}")]
    MalformedEncoding(&'static str),

    /// Wire kind (or integer range) disagrees with the requested kind.
    #[error("TLV type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: ElementType,
    },
}

/// Element tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlvTag {
    Anonymous,
    Context(u8),
    CommonProfile(u32),
    ImplicitProfile(u32),
    FullyQualified {
        vendor_id: u16,
        profile_num: u16,
        tag: u32,
    },
}

/// Element kind, independent of its encoded width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ElementType {
    SignedInteger,
    UnsignedInteger,
    Boolean,
    Float,
    Double,
    Utf8String,
    ByteString,
    Null,
    Structure,
    Array,
    List,
    EndOfContainer,
}

/// Raw element type field of the control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub(crate) enum WireType {
    Int8 = 0x00,
    Int16 = 0x01,
    Int32 = 0x02,
    Int64 = 0x03,
    UInt8 = 0x04,
    UInt16 = 0x05,
    UInt32 = 0x06,
    UInt64 = 0x07,
    False = 0x08,
    True = 0x09,
    Float32 = 0x0A,
    Float64 = 0x0B,
    Utf8Len1 = 0x0C,
    Utf8Len2 = 0x0D,
    Utf8Len4 = 0x0E,
    Utf8Len8 = 0x0F,
    BytesLen1 = 0x10,
    BytesLen2 = 0x11,
    BytesLen4 = 0x12,
    BytesLen8 = 0x13,
    Null = 0x14,
    Structure = 0x15,
    Array = 0x16,
    List = 0x17,
    EndOfContainer = 0x18,
}

/// Tag control values (upper 3 bits of the control byte).
pub(crate) mod tag_control {
    pub const ANONYMOUS: u8 = 0;
    pub const CONTEXT: u8 = 1;
    pub const COMMON_PROFILE_2: u8 = 2;
    pub const COMMON_PROFILE_4: u8 = 3;
    pub const IMPLICIT_PROFILE_2: u8 = 4;
    pub const IMPLICIT_PROFILE_4: u8 = 5;
    pub const FULLY_QUALIFIED_6: u8 = 6;
    pub const FULLY_QUALIFIED_8: u8 = 7;
}

/// Number of value bytes (or length-field bytes for strings) for a width index 0..=3.
pub(crate) fn width_bytes(index: u8) -> usize {
    1 << (index & 0x03)
}
