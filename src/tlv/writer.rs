//! TLV encoder, the mirror image of [`TlvReader`](super::TlvReader).
//!
//! Integers and length fields are written in the narrowest width that holds
//! the value.

use super::{ElementType, TlvError, TlvTag, WireType, tag_control};

/// Appends TLV elements to an owned buffer.
#[derive(Debug, Default)]
pub struct TlvWriter {
    buf: Vec<u8>,
    open: Vec<ElementType>,
}

impl TlvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Finish encoding. Fails if a container is still open.
    pub fn finish(self) -> Result<Vec<u8>, TlvError> {
        if !self.open.is_empty() {
            return Err(TlvError::MalformedEncoding("unterminated container"));
        }
        Ok(self.buf)
    }

    fn check_tag(&self, tag: &TlvTag) -> Result<(), TlvError> {
        match (self.open.last(), tag) {
            (Some(ElementType::Array), TlvTag::Anonymous) => Ok(()),
            (Some(ElementType::Array), _) => Err(TlvError::MalformedEncoding(
                "array elements must be anonymous",
            )),
            (Some(ElementType::Structure), TlvTag::Anonymous) => Err(
                TlvError::MalformedEncoding("structure members must be tagged"),
            ),
            _ => Ok(()),
        }
    }

    fn header(&mut self, tag: &TlvTag, wire: WireType) -> Result<(), TlvError> {
        self.check_tag(tag)?;
        let wire = wire as u8;
        match *tag {
            TlvTag::Anonymous => self.buf.push((tag_control::ANONYMOUS << 5) | wire),
            TlvTag::Context(t) => {
                self.buf.push((tag_control::CONTEXT << 5) | wire);
                self.buf.push(t);
            }
            TlvTag::CommonProfile(t) => match u16::try_from(t) {
                Ok(short) => {
                    self.buf.push((tag_control::COMMON_PROFILE_2 << 5) | wire);
                    self.buf.extend_from_slice(&short.to_le_bytes());
                }
                Err(_) => {
                    self.buf.push((tag_control::COMMON_PROFILE_4 << 5) | wire);
                    self.buf.extend_from_slice(&t.to_le_bytes());
                }
            },
            TlvTag::ImplicitProfile(t) => match u16::try_from(t) {
                Ok(short) => {
                    self.buf.push((tag_control::IMPLICIT_PROFILE_2 << 5) | wire);
                    self.buf.extend_from_slice(&short.to_le_bytes());
                }
                Err(_) => {
                    self.buf.push((tag_control::IMPLICIT_PROFILE_4 << 5) | wire);
                    self.buf.extend_from_slice(&t.to_le_bytes());
                }
            },
            TlvTag::FullyQualified {
                vendor_id,
                profile_num,
                tag,
            } => {
                let short = u16::try_from(tag).ok();
                let control = if short.is_some() {
                    tag_control::FULLY_QUALIFIED_6
                } else {
                    tag_control::FULLY_QUALIFIED_8
                };
                self.buf.push((control << 5) | wire);
                self.buf.extend_from_slice(&vendor_id.to_le_bytes());
                self.buf.extend_from_slice(&profile_num.to_le_bytes());
                match short {
                    Some(short) => self.buf.extend_from_slice(&short.to_le_bytes()),
                    None => self.buf.extend_from_slice(&tag.to_le_bytes()),
                }
            }
        }
        Ok(())
    }

    pub fn u64(&mut self, tag: &TlvTag, value: u64) -> Result<(), TlvError> {
        let (wire, len) = if value <= u64::from(u8::MAX) {
            (WireType::UInt8, 1)
        } else if value <= u64::from(u16::MAX) {
            (WireType::UInt16, 2)
        } else if value <= u64::from(u32::MAX) {
            (WireType::UInt32, 4)
        } else {
            (WireType::UInt64, 8)
        };
        self.header(tag, wire)?;
        self.buf.extend_from_slice(&value.to_le_bytes()[..len]);
        Ok(())
    }

    pub fn u32(&mut self, tag: &TlvTag, value: u32) -> Result<(), TlvError> {
        self.u64(tag, value.into())
    }

    pub fn u16(&mut self, tag: &TlvTag, value: u16) -> Result<(), TlvError> {
        self.u64(tag, value.into())
    }

    pub fn u8(&mut self, tag: &TlvTag, value: u8) -> Result<(), TlvError> {
        self.u64(tag, value.into())
    }

    pub fn i64(&mut self, tag: &TlvTag, value: i64) -> Result<(), TlvError> {
        let (wire, len) = if i8::try_from(value).is_ok() {
            (WireType::Int8, 1)
        } else if i16::try_from(value).is_ok() {
            (WireType::Int16, 2)
        } else if i32::try_from(value).is_ok() {
            (WireType::Int32, 4)
        } else {
            (WireType::Int64, 8)
        };
        self.header(tag, wire)?;
        self.buf.extend_from_slice(&value.to_le_bytes()[..len]);
        Ok(())
    }

    pub fn i32(&mut self, tag: &TlvTag, value: i32) -> Result<(), TlvError> {
        self.i64(tag, value.into())
    }

    pub fn i16(&mut self, tag: &TlvTag, value: i16) -> Result<(), TlvError> {
        self.i64(tag, value.into())
    }

    pub fn i8(&mut self, tag: &TlvTag, value: i8) -> Result<(), TlvError> {
        self.i64(tag, value.into())
    }

    pub fn bool(&mut self, tag: &TlvTag, value: bool) -> Result<(), TlvError> {
        self.header(tag, if value { WireType::True } else { WireType::False })
    }

    pub fn f32(&mut self, tag: &TlvTag, value: f32) -> Result<(), TlvError> {
        self.header(tag, WireType::Float32)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn f64(&mut self, tag: &TlvTag, value: f64) -> Result<(), TlvError> {
        self.header(tag, WireType::Float64)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn null(&mut self, tag: &TlvTag) -> Result<(), TlvError> {
        self.header(tag, WireType::Null)
    }

    pub fn utf8(&mut self, tag: &TlvTag, value: &str) -> Result<(), TlvError> {
        let wire = [
            WireType::Utf8Len1,
            WireType::Utf8Len2,
            WireType::Utf8Len4,
            WireType::Utf8Len8,
        ];
        self.string(tag, &wire, value.as_bytes())
    }

    pub fn bytes(&mut self, tag: &TlvTag, value: &[u8]) -> Result<(), TlvError> {
        let wire = [
            WireType::BytesLen1,
            WireType::BytesLen2,
            WireType::BytesLen4,
            WireType::BytesLen8,
        ];
        self.string(tag, &wire, value)
    }

    fn string(&mut self, tag: &TlvTag, wire: &[WireType; 4], value: &[u8]) -> Result<(), TlvError> {
        let len = value.len() as u64;
        let (index, width) = if len <= u64::from(u8::MAX) {
            (0, 1)
        } else if len <= u64::from(u16::MAX) {
            (1, 2)
        } else if len <= u64::from(u32::MAX) {
            (2, 4)
        } else {
            (3, 8)
        };
        self.header(tag, wire[index])?;
        self.buf.extend_from_slice(&len.to_le_bytes()[..width]);
        self.buf.extend_from_slice(value);
        Ok(())
    }

    pub fn start_struct(&mut self, tag: &TlvTag) -> Result<(), TlvError> {
        self.header(tag, WireType::Structure)?;
        self.open.push(ElementType::Structure);
        Ok(())
    }

    pub fn start_array(&mut self, tag: &TlvTag) -> Result<(), TlvError> {
        self.header(tag, WireType::Array)?;
        self.open.push(ElementType::Array);
        Ok(())
    }

    pub fn start_list(&mut self, tag: &TlvTag) -> Result<(), TlvError> {
        self.header(tag, WireType::List)?;
        self.open.push(ElementType::List);
        Ok(())
    }

    pub fn end_container(&mut self) -> Result<(), TlvError> {
        self.open
            .pop()
            .ok_or(TlvError::MalformedEncoding("no open container"))?;
        self.buf.push(WireType::EndOfContainer as u8);
        Ok(())
    }
}
