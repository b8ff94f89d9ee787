//! List attribute decoding.
//!
//! The wire format does not announce array lengths, so the count is the
//! result of scanning every element. A list is only handed out once the scan
//! has reached the end marker; one bad element fails the whole list.

use super::{Element, TlvError, TlvReader, Value};

/// Decoded list attribute: entry count plus entries in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAttribute<T> {
    pub count: u16,
    pub entries: Vec<T>,
}

impl<T> ListAttribute<T> {
    pub fn empty() -> Self {
        Self {
            count: 0,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// Convert every entry, keeping the count.
    pub fn try_map<U, E>(&self, f: impl FnMut(&T) -> Result<U, E>) -> Result<ListAttribute<U>, E> {
        Ok(ListAttribute {
            count: self.count,
            entries: self.entries.iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

impl<T> Default for ListAttribute<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Decode the array (or list) `element` that `reader` just returned.
///
/// `decode` is called once per entry with the array's own reader, so it can
/// enter structured entries.
pub fn decode_list<'a, T, F>(
    reader: &mut TlvReader<'a>,
    element: &Element<'a>,
    mut decode: F,
) -> Result<ListAttribute<T>, TlvError>
where
    F: FnMut(&mut TlvReader<'a>, Element<'a>) -> Result<T, TlvError>,
{
    if !matches!(element.value, Value::Array | Value::List) {
        return Err(element.mismatch("array"));
    }

    let mut items = reader.enter()?;
    let mut entries = Vec::new();
    while let Some(entry) = items.next()? {
        if entries.len() == usize::from(u16::MAX) {
            return Err(TlvError::MalformedEncoding("list exceeds 65535 entries"));
        }
        entries.push(decode(&mut items, entry)?);
    }
    reader.exit(items)?;

    let count = u16::try_from(entries.len())
        .map_err(|_| TlvError::MalformedEncoding("list exceeds 65535 entries"))?;
    Ok(ListAttribute { count, entries })
}

/// Read the next element from `reader` and decode it as a list.
pub fn read_list<'a, T, F>(reader: &mut TlvReader<'a>, decode: F) -> Result<ListAttribute<T>, TlvError>
where
    F: FnMut(&mut TlvReader<'a>, Element<'a>) -> Result<T, TlvError>,
{
    let element = reader.expect_next()?;
    decode_list(reader, &element, decode)
}
