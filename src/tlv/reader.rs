//! Forward-only TLV cursor.
//!
//! A [`TlvReader`] walks the elements of one container (or of the top-level
//! buffer). When [`TlvReader::next`] returns a structure, array or list, the
//! caller can [`enter`](TlvReader::enter) it to get a child reader bounded to
//! the container body, and must hand it back through
//! [`exit`](TlvReader::exit) before the parent reads again. A container that
//! is returned but not entered is skipped by the following `next()`.

use super::{ElementType, TlvError, TlvTag, WireType, tag_control, width_bytes};

/// A decoded element value. Strings borrow from the underlying buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Signed(i64),
    Unsigned(u64),
    Bool(bool),
    Float(f32),
    Double(f64),
    Utf8(&'a str),
    Bytes(&'a [u8]),
    Null,
    Structure,
    Array,
    List,
    EndOfContainer,
}

impl Value<'_> {
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Signed(_) => ElementType::SignedInteger,
            Value::Unsigned(_) => ElementType::UnsignedInteger,
            Value::Bool(_) => ElementType::Boolean,
            Value::Float(_) => ElementType::Float,
            Value::Double(_) => ElementType::Double,
            Value::Utf8(_) => ElementType::Utf8String,
            Value::Bytes(_) => ElementType::ByteString,
            Value::Null => ElementType::Null,
            Value::Structure => ElementType::Structure,
            Value::Array => ElementType::Array,
            Value::List => ElementType::List,
            Value::EndOfContainer => ElementType::EndOfContainer,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Structure | Value::Array | Value::List)
    }
}

/// One tagged element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element<'a> {
    pub tag: TlvTag,
    pub value: Value<'a>,
}

impl<'a> Element<'a> {
    pub fn element_type(&self) -> ElementType {
        self.value.element_type()
    }

    /// Build a `TypeMismatch` error against this element.
    pub fn mismatch(&self, expected: &'static str) -> TlvError {
        TlvError::TypeMismatch {
            expected,
            found: self.element_type(),
        }
    }

    pub fn u64(&self) -> Result<u64, TlvError> {
        match self.value {
            Value::Unsigned(v) => Ok(v),
            _ => Err(self.mismatch("unsigned integer")),
        }
    }

    pub fn u32(&self) -> Result<u32, TlvError> {
        u32::try_from(self.u64()?).map_err(|_| self.mismatch("u32"))
    }

    pub fn u16(&self) -> Result<u16, TlvError> {
        u16::try_from(self.u64()?).map_err(|_| self.mismatch("u16"))
    }

    pub fn u8(&self) -> Result<u8, TlvError> {
        u8::try_from(self.u64()?).map_err(|_| self.mismatch("u8"))
    }

    pub fn i64(&self) -> Result<i64, TlvError> {
        match self.value {
            Value::Signed(v) => Ok(v),
            _ => Err(self.mismatch("signed integer")),
        }
    }

    pub fn i32(&self) -> Result<i32, TlvError> {
        i32::try_from(self.i64()?).map_err(|_| self.mismatch("i32"))
    }

    pub fn i16(&self) -> Result<i16, TlvError> {
        i16::try_from(self.i64()?).map_err(|_| self.mismatch("i16"))
    }

    pub fn i8(&self) -> Result<i8, TlvError> {
        i8::try_from(self.i64()?).map_err(|_| self.mismatch("i8"))
    }

    pub fn bool(&self) -> Result<bool, TlvError> {
        match self.value {
            Value::Bool(v) => Ok(v),
            _ => Err(self.mismatch("boolean")),
        }
    }

    pub fn f32(&self) -> Result<f32, TlvError> {
        match self.value {
            Value::Float(v) => Ok(v),
            _ => Err(self.mismatch("float")),
        }
    }

    /// Reads a double, widening a single-precision float.
    pub fn f64(&self) -> Result<f64, TlvError> {
        match self.value {
            Value::Double(v) => Ok(v),
            Value::Float(v) => Ok(f64::from(v)),
            _ => Err(self.mismatch("double")),
        }
    }

    pub fn utf8(&self) -> Result<&'a str, TlvError> {
        match self.value {
            Value::Utf8(v) => Ok(v),
            _ => Err(self.mismatch("UTF-8 string")),
        }
    }

    pub fn bytes(&self) -> Result<&'a [u8], TlvError> {
        match self.value {
            Value::Bytes(v) => Ok(v),
            _ => Err(self.mismatch("byte string")),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenChild {
    body_start: usize,
    resume: usize,
}

/// Sequential reader over one TLV container.
#[derive(Debug)]
pub struct TlvReader<'a> {
    buf: &'a [u8],
    start: usize,
    pos: usize,
    end: usize,
    container: Option<ElementType>,
    /// Body start and kind of the last returned container, if not yet entered.
    pending: Option<(usize, ElementType)>,
    open_child: Option<OpenChild>,
}

impl<'a> TlvReader<'a> {
    /// Reader over the whole buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self::top_level(buf, 0)
    }

    /// Reader starting at `offset` and running to the end of the buffer.
    pub fn at(buf: &'a [u8], offset: usize) -> Result<Self, TlvError> {
        if offset > buf.len() {
            return Err(TlvError::MalformedEncoding("offset past end of buffer"));
        }
        Ok(Self::top_level(buf, offset))
    }

    fn top_level(buf: &'a [u8], offset: usize) -> Self {
        Self {
            buf,
            start: offset,
            pos: offset,
            end: buf.len(),
            container: None,
            pending: None,
            open_child: None,
        }
    }

    /// Kind of container this reader walks, `None` at top level.
    pub fn container_type(&self) -> Option<ElementType> {
        self.container
    }

    /// Current byte offset into the underlying buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left in this reader's range.
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Read the next element, or `None` once this container is exhausted.
    pub fn next(&mut self) -> Result<Option<Element<'a>>, TlvError> {
        if self.open_child.is_some() {
            return Err(TlvError::MalformedEncoding("read while a child container is open"));
        }
        if let Some((body, _)) = self.pending {
            let end_marker = scan_container_end(self.buf, body, self.end)?;
            self.pending = None;
            self.pos = end_marker + 1;
        }
        if self.pos >= self.end {
            return Ok(None);
        }

        let (element, next) = decode_element(self.buf, self.pos, self.end)?;
        if let Value::EndOfContainer = element.value {
            return Err(TlvError::MalformedEncoding("unexpected end-of-container"));
        }
        if element.value.is_container() {
            self.pending = Some((next, element.element_type()));
        }
        self.pos = next;
        Ok(Some(element))
    }

    /// Like [`next`](Self::next), but running out of elements is an error.
    pub fn expect_next(&mut self) -> Result<Element<'a>, TlvError> {
        self.next()?
            .ok_or(TlvError::MalformedEncoding("unexpected end of data"))
    }

    /// Read the next element and require it to carry `tag`.
    pub fn read_tagged(&mut self, tag: &TlvTag) -> Result<Element<'a>, TlvError> {
        let element = self.expect_next()?;
        if element.tag != *tag {
            return Err(TlvError::MalformedEncoding("unexpected tag"));
        }
        Ok(element)
    }

    /// Enter the container returned by the last `next()`.
    pub fn enter(&mut self) -> Result<TlvReader<'a>, TlvError> {
        if self.open_child.is_some() {
            return Err(TlvError::MalformedEncoding("a child container is already open"));
        }
        let (body, kind) = self
            .pending
            .ok_or(TlvError::MalformedEncoding("no container to enter"))?;
        let end_marker = scan_container_end(self.buf, body, self.end)?;
        self.pending = None;
        self.open_child = Some(OpenChild {
            body_start: body,
            resume: end_marker + 1,
        });
        Ok(TlvReader {
            buf: self.buf,
            start: body,
            pos: body,
            end: end_marker,
            container: Some(kind),
            pending: None,
            open_child: None,
        })
    }

    /// Close a child obtained from [`enter`](Self::enter). The child must be exhausted.
    pub fn exit(&mut self, child: TlvReader<'a>) -> Result<(), TlvError> {
        let open = self
            .open_child
            .ok_or(TlvError::MalformedEncoding("no open container to exit"))?;
        if child.start != open.body_start || child.end + 1 != open.resume {
            return Err(TlvError::MalformedEncoding(
                "container does not belong to this reader",
            ));
        }
        if child.open_child.is_some() {
            return Err(TlvError::MalformedEncoding("nested container still open"));
        }
        if child.pending.is_some() || child.pos < child.end {
            return Err(TlvError::MalformedEncoding(
                "container exited with unread elements",
            ));
        }
        self.open_child = None;
        self.pos = open.resume;
        Ok(())
    }

    /// Skip everything left in this container.
    pub fn skip_remaining(&mut self) -> Result<(), TlvError> {
        while self.next()?.is_some() {}
        Ok(())
    }
}

/// Find the end-of-container marker closing the body that starts at `body`.
fn scan_container_end(buf: &[u8], body: usize, limit: usize) -> Result<usize, TlvError> {
    let mut depth = 0usize;
    let mut pos = body;
    loop {
        if pos >= limit {
            return Err(TlvError::MalformedEncoding("unterminated container"));
        }
        let (element, next) = decode_element(buf, pos, limit)?;
        match element.value {
            Value::EndOfContainer if depth == 0 => return Ok(pos),
            Value::EndOfContainer => depth -= 1,
            v if v.is_container() => depth += 1,
            _ => {}
        }
        pos = next;
    }
}

fn take<'a>(
    buf: &'a [u8],
    cursor: &mut usize,
    limit: usize,
    len: usize,
) -> Result<&'a [u8], TlvError> {
    if len > limit.saturating_sub(*cursor) {
        return Err(TlvError::MalformedEncoding("length exceeds remaining bytes"));
    }
    let bytes = &buf[*cursor..*cursor + len];
    *cursor += len;
    Ok(bytes)
}

fn le_uint(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn read_uint(buf: &[u8], cursor: &mut usize, limit: usize, len: usize) -> Result<u64, TlvError> {
    take(buf, cursor, limit, len).map(le_uint)
}

fn read_tag(buf: &[u8], cursor: &mut usize, limit: usize, control: u8) -> Result<TlvTag, TlvError> {
    let tag = match control {
        tag_control::ANONYMOUS => TlvTag::Anonymous,
        tag_control::CONTEXT => TlvTag::Context(read_uint(buf, cursor, limit, 1)? as u8),
        tag_control::COMMON_PROFILE_2 => {
            TlvTag::CommonProfile(read_uint(buf, cursor, limit, 2)? as u32)
        }
        tag_control::COMMON_PROFILE_4 => {
            TlvTag::CommonProfile(read_uint(buf, cursor, limit, 4)? as u32)
        }
        tag_control::IMPLICIT_PROFILE_2 => {
            TlvTag::ImplicitProfile(read_uint(buf, cursor, limit, 2)? as u32)
        }
        tag_control::IMPLICIT_PROFILE_4 => {
            TlvTag::ImplicitProfile(read_uint(buf, cursor, limit, 4)? as u32)
        }
        tag_control::FULLY_QUALIFIED_6 | tag_control::FULLY_QUALIFIED_8 => {
            let vendor_id = read_uint(buf, cursor, limit, 2)? as u16;
            let profile_num = read_uint(buf, cursor, limit, 2)? as u16;
            let tag_len = if control == tag_control::FULLY_QUALIFIED_6 { 2 } else { 4 };
            let tag = read_uint(buf, cursor, limit, tag_len)? as u32;
            TlvTag::FullyQualified {
                vendor_id,
                profile_num,
                tag,
            }
        }
        _ => return Err(TlvError::MalformedEncoding("reserved tag control")),
    };
    Ok(tag)
}

/// Decode the element at `pos`. Returns it together with the offset just past
/// it (for containers: the first byte of the body).
fn decode_element(buf: &[u8], pos: usize, limit: usize) -> Result<(Element<'_>, usize), TlvError> {
    if pos >= limit {
        return Err(TlvError::MalformedEncoding("truncated element header"));
    }
    let control = buf[pos];
    let wire = WireType::from_repr(control & 0x1F)
        .ok_or(TlvError::MalformedEncoding("unknown element type"))?;
    let mut cursor = pos + 1;
    let tag = read_tag(buf, &mut cursor, limit, control >> 5)?;

    let width = width_bytes(control);
    let value = match wire {
        WireType::Int8 | WireType::Int16 | WireType::Int32 | WireType::Int64 => {
            let raw = read_uint(buf, &mut cursor, limit, width)?;
            let shift = 64 - 8 * width as u32;
            Value::Signed(((raw << shift) as i64) >> shift)
        }
        WireType::UInt8 | WireType::UInt16 | WireType::UInt32 | WireType::UInt64 => {
            Value::Unsigned(read_uint(buf, &mut cursor, limit, width)?)
        }
        WireType::False => Value::Bool(false),
        WireType::True => Value::Bool(true),
        WireType::Float32 => {
            Value::Float(f32::from_bits(read_uint(buf, &mut cursor, limit, 4)? as u32))
        }
        WireType::Float64 => Value::Double(f64::from_bits(read_uint(buf, &mut cursor, limit, 8)?)),
        WireType::Utf8Len1 | WireType::Utf8Len2 | WireType::Utf8Len4 | WireType::Utf8Len8 => {
            let bytes = read_string(buf, &mut cursor, limit, width)?;
            let text = std::str::from_utf8(bytes)
                .map_err(|_| TlvError::MalformedEncoding("invalid UTF-8 string"))?;
            Value::Utf8(text)
        }
        WireType::BytesLen1 | WireType::BytesLen2 | WireType::BytesLen4 | WireType::BytesLen8 => {
            Value::Bytes(read_string(buf, &mut cursor, limit, width)?)
        }
        WireType::Null => Value::Null,
        WireType::Structure => Value::Structure,
        WireType::Array => Value::Array,
        WireType::List => Value::List,
        WireType::EndOfContainer => {
            if tag != TlvTag::Anonymous {
                return Err(TlvError::MalformedEncoding("tagged end-of-container"));
            }
            Value::EndOfContainer
        }
    };
    Ok((Element { tag, value }, cursor))
}

fn read_string<'a>(
    buf: &'a [u8],
    cursor: &mut usize,
    limit: usize,
    len_width: usize,
) -> Result<&'a [u8], TlvError> {
    let len = read_uint(buf, cursor, limit, len_width)?;
    let len = usize::try_from(len)
        .map_err(|_| TlvError::MalformedEncoding("length exceeds remaining bytes"))?;
    take(buf, cursor, limit, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::TlvWriter;

    fn encode(build: impl FnOnce(&mut TlvWriter) -> Result<(), TlvError>) -> Vec<u8> {
        let mut tw = TlvWriter::new();
        build(&mut tw).unwrap();
        tw.finish().unwrap()
    }

    #[test]
    fn test_reads_context_tagged_scalars() {
        // struct { 0: u8 = 5, 1: i16 = -300, 2: "hi", 3: true }
        let bytes = [
            0x15, 0x24, 0x00, 0x05, 0x21, 0x01, 0xD4, 0xFE, 0x2C, 0x02, 0x02, b'h', b'i', 0x29,
            0x03, 0x18,
        ];
        let mut reader = TlvReader::new(&bytes);
        let outer = reader.expect_next().unwrap();
        assert_eq!(outer.value, Value::Structure);

        let mut fields = reader.enter().unwrap();
        let a = fields.read_tagged(&TlvTag::Context(0)).unwrap();
        assert_eq!(a.u8().unwrap(), 5);
        assert_eq!(a.u64().unwrap(), 5);
        let b = fields.read_tagged(&TlvTag::Context(1)).unwrap();
        assert_eq!(b.i16().unwrap(), -300);
        assert_eq!(b.i64().unwrap(), -300);
        assert_eq!(fields.expect_next().unwrap().utf8().unwrap(), "hi");
        assert!(fields.expect_next().unwrap().bool().unwrap());
        assert!(fields.next().unwrap().is_none());

        reader.exit(fields).unwrap();
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn test_narrow_wire_integer_widens() {
        let bytes = encode(|tw| tw.u8(&TlvTag::Anonymous, 200));
        let element = TlvReader::new(&bytes).expect_next().unwrap();
        assert_eq!(element.u32().unwrap(), 200);
        assert_eq!(element.u64().unwrap(), 200);
    }

    #[test]
    fn test_out_of_range_integer_is_type_mismatch() {
        let bytes = encode(|tw| tw.u32(&TlvTag::Anonymous, 70_000));
        let element = TlvReader::new(&bytes).expect_next().unwrap();
        assert!(matches!(element.u16(), Err(TlvError::TypeMismatch { .. })));
    }

    #[test]
    fn test_wrong_kind_is_type_mismatch() {
        let bytes = encode(|tw| tw.utf8(&TlvTag::Anonymous, "x"));
        let element = TlvReader::new(&bytes).expect_next().unwrap();
        assert_eq!(
            element.u8(),
            Err(TlvError::TypeMismatch {
                expected: "unsigned integer",
                found: ElementType::Utf8String,
            })
        );
        assert!(matches!(element.i8(), Err(TlvError::TypeMismatch { .. })));
    }

    #[test]
    fn test_truncated_value_is_malformed() {
        // u32 with only two value bytes
        let bytes = [0x06, 0x01, 0x02];
        let mut reader = TlvReader::new(&bytes);
        assert_eq!(
            reader.next(),
            Err(TlvError::MalformedEncoding("length exceeds remaining bytes"))
        );
    }

    #[test]
    fn test_string_length_past_end_is_malformed() {
        // byte string claims 10 bytes, 3 present
        let bytes = [0x10, 0x0A, 0x01, 0x02, 0x03];
        let mut reader = TlvReader::new(&bytes);
        assert!(matches!(reader.next(), Err(TlvError::MalformedEncoding(_))));
    }

    #[test]
    fn test_unterminated_container_is_malformed() {
        let bytes = [0x15, 0x24, 0x00, 0x01];
        let mut reader = TlvReader::new(&bytes);
        reader.expect_next().unwrap();
        assert_eq!(
            reader.enter().unwrap_err(),
            TlvError::MalformedEncoding("unterminated container")
        );
    }

    #[test]
    fn test_stray_end_of_container_is_malformed() {
        let bytes = [0x18];
        assert!(matches!(
            TlvReader::new(&bytes).next(),
            Err(TlvError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn test_unentered_container_is_skipped() {
        let bytes = encode(|tw| {
            tw.start_array(&TlvTag::Anonymous)?;
            tw.start_struct(&TlvTag::Anonymous)?;
            tw.u8(&TlvTag::Context(0), 1)?;
            tw.end_container()?;
            tw.end_container()?;
            tw.u8(&TlvTag::Anonymous, 9)
        });
        let mut reader = TlvReader::new(&bytes);
        assert_eq!(reader.expect_next().unwrap().value, Value::Array);
        assert_eq!(reader.expect_next().unwrap().u8().unwrap(), 9);
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn test_exit_with_unread_elements_fails() {
        let bytes = encode(|tw| {
            tw.start_struct(&TlvTag::Anonymous)?;
            tw.u8(&TlvTag::Context(0), 1)?;
            tw.u8(&TlvTag::Context(1), 2)?;
            tw.end_container()
        });
        let mut reader = TlvReader::new(&bytes);
        reader.expect_next().unwrap();
        let mut child = reader.enter().unwrap();
        child.expect_next().unwrap();
        assert_eq!(
            reader.exit(child).unwrap_err(),
            TlvError::MalformedEncoding("container exited with unread elements")
        );
    }

    #[test]
    fn test_skip_remaining_allows_exit() {
        let bytes = encode(|tw| {
            tw.start_struct(&TlvTag::Anonymous)?;
            tw.u8(&TlvTag::Context(0), 1)?;
            tw.start_array(&TlvTag::Context(1))?;
            tw.u8(&TlvTag::Anonymous, 2)?;
            tw.end_container()?;
            tw.end_container()
        });
        let mut reader = TlvReader::new(&bytes);
        reader.expect_next().unwrap();
        let mut child = reader.enter().unwrap();
        child.expect_next().unwrap();
        child.skip_remaining().unwrap();
        reader.exit(child).unwrap();
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn test_parent_read_while_child_open_fails() {
        let bytes = encode(|tw| {
            tw.start_struct(&TlvTag::Anonymous)?;
            tw.end_container()?;
            tw.u8(&TlvTag::Anonymous, 1)
        });
        let mut reader = TlvReader::new(&bytes);
        reader.expect_next().unwrap();
        let _child = reader.enter().unwrap();
        assert!(matches!(reader.next(), Err(TlvError::MalformedEncoding(_))));
    }

    #[test]
    fn test_reader_at_offset() {
        let bytes = [0xFF, 0xFF, 0x04, 0x2A];
        let mut reader = TlvReader::at(&bytes, 2).unwrap();
        assert_eq!(reader.expect_next().unwrap().u8().unwrap(), 42);
        assert!(TlvReader::at(&bytes, 5).is_err());
    }

    #[test]
    fn test_profile_tags() {
        let bytes = encode(|tw| {
            tw.u8(&TlvTag::CommonProfile(0x1234), 1)?;
            tw.u8(&TlvTag::ImplicitProfile(0x0001_0000), 2)?;
            tw.u8(
                &TlvTag::FullyQualified {
                    vendor_id: 0xFFF1,
                    profile_num: 0x0001,
                    tag: 7,
                },
                3,
            )
        });
        let mut reader = TlvReader::new(&bytes);
        assert_eq!(reader.expect_next().unwrap().tag, TlvTag::CommonProfile(0x1234));
        assert_eq!(
            reader.expect_next().unwrap().tag,
            TlvTag::ImplicitProfile(0x0001_0000)
        );
        assert_eq!(
            reader.expect_next().unwrap().tag,
            TlvTag::FullyQualified {
                vendor_id: 0xFFF1,
                profile_num: 0x0001,
                tag: 7,
            }
        );
    }
}
