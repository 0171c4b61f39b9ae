//! Diff payloads for dictionary-shaped objects.
//!
//! ```text
//! pair_count  varuint
//! repeated pair_count times, keys strictly ascending:
//!     key         varuint
//!     value_tag   u8        (low nibble = ValueType, high nibble = 0)
//!     value       depends on tag; absent for Null and Tombstone
//! ```

use crate::format::varint::{put_varint, put_varuint};
use crate::format::{Address64, ByteCursor, DecodeError, DecodeResult, Ptr64};
use crate::types::ObjectId;

/// Wire type of a diff value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueType {
    /// Explicit null, no value bytes.
    Null = 0,
    /// Key removed, no value bytes.
    Tombstone = 1,
    /// Reference to another object (varuint id).
    ObjRef = 2,
    /// Signed integer (zig-zag varint).
    VarInt = 3,
    /// Data log pointer (u64 LE).
    Ptr64 = 4,
}

impl ValueType {
    /// Parses a value tag byte.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::DiffPayloadFormat`] if the high nibble is set
    /// - [`DecodeError::UnknownValueType`] for an unknown low nibble
    pub fn from_tag(tag: u8) -> DecodeResult<Self> {
        if tag & 0xF0 != 0 {
            return Err(DecodeError::diff_format(format!(
                "value tag {tag:#04x} has reserved high bits set"
            )));
        }
        match tag {
            0 => Ok(Self::Null),
            1 => Ok(Self::Tombstone),
            2 => Ok(Self::ObjRef),
            3 => Ok(Self::VarInt),
            4 => Ok(Self::Ptr64),
            _ => Err(DecodeError::UnknownValueType { tag }),
        }
    }

    /// Returns the tag byte.
    #[must_use]
    pub const fn as_tag(self) -> u8 {
        self as u8
    }

    /// Returns the type name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Tombstone => "Tombstone",
            Self::ObjRef => "ObjRef",
            Self::VarInt => "VarInt",
            Self::Ptr64 => "Ptr64",
        }
    }
}

/// A value stored in a durable dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// Explicit null.
    Null,
    /// Signed integer.
    Int(i64),
    /// Reference to another durable object.
    ObjRef(ObjectId),
    /// Data log pointer.
    Ptr(Ptr64),
}

impl Value {
    /// Returns the wire type of this value.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Int(_) => ValueType::VarInt,
            Self::ObjRef(_) => ValueType::ObjRef,
            Self::Ptr(_) => ValueType::Ptr64,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the referenced object, if this is a reference.
    #[must_use]
    pub const fn as_obj_ref(&self) -> Option<ObjectId> {
        match self {
            Self::ObjRef(id) => Some(*id),
            _ => None,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.value_type().as_tag());
        match self {
            Self::Null => {}
            Self::Int(v) => put_varint(out, *v),
            Self::ObjRef(id) => put_varuint(out, id.as_u64()),
            Self::Ptr(ptr) => out.extend_from_slice(&ptr.as_u64().to_le_bytes()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::ObjRef(id)
    }
}

/// One entry of a diff: a new value or a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffChange<V> {
    /// The key now maps to this value.
    Present(V),
    /// The key was removed.
    Removed,
}

/// A type that can live in a [`DurableDict`](crate::object::DurableDict).
///
/// Values travel through the wire as [`Value`]; implementors pick which
/// wire values they accept.
pub trait DictValue: Clone + PartialEq + std::fmt::Debug {
    /// Converts to the wire representation.
    fn to_value(&self) -> Value;

    /// Converts from the wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::ValueTypeMismatch`] for unsupported values.
    fn from_value(value: Value) -> DecodeResult<Self>;
}

impl DictValue for Value {
    fn to_value(&self) -> Value {
        *self
    }

    fn from_value(value: Value) -> DecodeResult<Self> {
        Ok(value)
    }
}

/// Version index entries: `None` is an explicit null pointer.
impl DictValue for Option<Ptr64> {
    fn to_value(&self) -> Value {
        match self {
            Some(ptr) if !ptr.is_null() => Value::Ptr(*ptr),
            _ => Value::Null,
        }
    }

    fn from_value(value: Value) -> DecodeResult<Self> {
        match value {
            Value::Null => Ok(None),
            Value::Ptr(ptr) => Ok(ptr.non_null()),
            other => Err(DecodeError::ValueTypeMismatch {
                expected: "Ptr64 or Null",
                found: other.value_type().name(),
            }),
        }
    }
}

/// Encodes a diff. `entries` must be sorted by strictly ascending key.
pub fn encode_diff<V: DictValue>(entries: &[(u64, DiffChange<V>)], out: &mut Vec<u8>) {
    debug_assert!(
        entries.windows(2).all(|w| w[0].0 < w[1].0),
        "diff keys must be strictly ascending"
    );

    put_varuint(out, entries.len() as u64);
    for (key, change) in entries {
        put_varuint(out, *key);
        match change {
            DiffChange::Present(value) => value.to_value().write_to(out),
            DiffChange::Removed => out.push(ValueType::Tombstone.as_tag()),
        }
    }
}

/// Pull-style reader over an encoded diff.
///
/// The first malformed entry puts the reader into a terminal error state:
/// every later call returns the same error.
#[derive(Debug)]
pub struct DiffPayloadReader<'a> {
    cursor: ByteCursor<'a>,
    pair_count: u64,
    read: u64,
    last_key: Option<u64>,
    error: Option<DecodeError>,
}

impl<'a> DiffPayloadReader<'a> {
    /// Reads the pair count and positions the reader at the first entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair count cannot be decoded.
    pub fn new(bytes: &'a [u8]) -> DecodeResult<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let pair_count = cursor.read_varuint()?;
        Ok(Self {
            cursor,
            pair_count,
            read: 0,
            last_key: None,
            error: None,
        })
    }

    /// Returns the number of entries announced by the payload.
    #[must_use]
    pub fn pair_count(&self) -> u64 {
        self.pair_count
    }

    /// Returns the terminal error, if one occurred.
    #[must_use]
    pub fn error(&self) -> Option<&DecodeError> {
        self.error.as_ref()
    }

    /// Returns `true` once a malformed entry has been seen.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Reads the next entry.
    ///
    /// Returns `Ok(None)` after the last entry.
    ///
    /// # Errors
    ///
    /// Returns the terminal error for any malformed entry, trailing bytes
    /// after the last entry, or keys out of order.
    pub fn try_read_next(&mut self) -> DecodeResult<Option<(u64, DiffChange<Value>)>> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        match self.read_entry() {
            Ok(entry) => Ok(entry),
            Err(err) => {
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Reads every remaining entry, converting values to `V`.
    ///
    /// # Errors
    ///
    /// Returns the first decode or conversion error.
    pub fn read_all<V: DictValue>(mut self) -> DecodeResult<Vec<(u64, DiffChange<V>)>> {
        let mut entries = Vec::with_capacity(self.pair_count.min(1024) as usize);
        while let Some((key, change)) = self.try_read_next()? {
            let change = match change {
                DiffChange::Present(value) => DiffChange::Present(V::from_value(value)?),
                DiffChange::Removed => DiffChange::Removed,
            };
            entries.push((key, change));
        }
        Ok(entries)
    }

    fn read_entry(&mut self) -> DecodeResult<Option<(u64, DiffChange<Value>)>> {
        if self.read == self.pair_count {
            self.cursor.finish("diff payload")?;
            return Ok(None);
        }

        let key = self.cursor.read_varuint()?;
        if let Some(previous) = self.last_key {
            if key <= previous {
                return Err(DecodeError::DiffKeySorting { previous, key });
            }
        }

        let tag = self.cursor.read_u8("value tag")?;
        let change = match ValueType::from_tag(tag)? {
            ValueType::Null => DiffChange::Present(Value::Null),
            ValueType::Tombstone => DiffChange::Removed,
            ValueType::ObjRef => {
                DiffChange::Present(Value::ObjRef(ObjectId::new(self.cursor.read_varuint()?)))
            }
            ValueType::VarInt => DiffChange::Present(Value::Int(self.cursor.read_varint()?)),
            ValueType::Ptr64 => {
                let raw = self.cursor.read_u64_le("Ptr64 value")?;
                DiffChange::Present(Value::Ptr(Address64::new(raw)?))
            }
        };

        self.last_key = Some(key);
        self.read += 1;
        Ok(Some((key, change)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(entries: &[(u64, DiffChange<Value>)]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_diff(entries, &mut out);
        out
    }

    fn ptr(offset: u64) -> Ptr64 {
        Address64::new(offset).unwrap()
    }

    #[test]
    fn empty_diff() {
        let bytes = encode(&[]);
        assert_eq!(bytes, [0x00]);
        let mut reader = DiffPayloadReader::new(&bytes).unwrap();
        assert_eq!(reader.pair_count(), 0);
        assert_eq!(reader.try_read_next(), Ok(None));
    }

    #[test]
    fn wire_layout() {
        let bytes = encode(&[
            (1, DiffChange::Present(Value::Int(-1))),
            (2, DiffChange::Removed),
            (300, DiffChange::Present(Value::ObjRef(ObjectId::new(16)))),
        ]);
        assert_eq!(
            bytes,
            [0x03, 0x01, 0x03, 0x01, 0x02, 0x01, 0xAC, 0x02, 0x02, 0x10]
        );
    }

    #[test]
    fn reads_every_value_type() {
        let entries = vec![
            (1, DiffChange::Present(Value::Null)),
            (2, DiffChange::Removed),
            (3, DiffChange::Present(Value::ObjRef(ObjectId::new(99)))),
            (4, DiffChange::Present(Value::Int(i64::MIN))),
            (5, DiffChange::Present(Value::Ptr(ptr(0x1000)))),
        ];
        let bytes = encode(&entries);

        let reader = DiffPayloadReader::new(&bytes).unwrap();
        assert_eq!(reader.pair_count(), 5);
        assert_eq!(reader.read_all::<Value>().unwrap(), entries);
    }

    #[test]
    fn unknown_value_type_is_terminal() {
        let bytes = [0x02, 0x01, 0x07, 0x02, 0x00];
        let mut reader = DiffPayloadReader::new(&bytes).unwrap();
        let err = DecodeError::UnknownValueType { tag: 7 };
        assert_eq!(reader.try_read_next(), Err(err.clone()));
        assert!(reader.has_error());
        assert_eq!(reader.try_read_next(), Err(err.clone()));
        assert_eq!(reader.error(), Some(&err));
    }

    #[test]
    fn high_nibble_is_rejected() {
        let bytes = [0x01, 0x01, 0x13];
        let mut reader = DiffPayloadReader::new(&bytes).unwrap();
        assert!(matches!(
            reader.try_read_next(),
            Err(DecodeError::DiffPayloadFormat { .. })
        ));
    }

    #[test]
    fn keys_must_ascend() {
        let bytes = [0x02, 0x05, 0x00, 0x05, 0x00];
        let mut reader = DiffPayloadReader::new(&bytes).unwrap();
        assert!(reader.try_read_next().unwrap().is_some());
        assert_eq!(
            reader.try_read_next(),
            Err(DecodeError::DiffKeySorting {
                previous: 5,
                key: 5
            })
        );
    }

    #[test]
    fn truncated_entry() {
        let bytes = encode(&[(1, DiffChange::Present(Value::Ptr(ptr(8))))]);
        let mut reader = DiffPayloadReader::new(&bytes[..bytes.len() - 2]).unwrap();
        assert_eq!(
            reader.try_read_next(),
            Err(DecodeError::UnexpectedEof {
                context: "Ptr64 value"
            })
        );

        let mut reader = DiffPayloadReader::new(&[0x01, 0x01]).unwrap();
        assert_eq!(
            reader.try_read_next(),
            Err(DecodeError::UnexpectedEof {
                context: "value tag"
            })
        );
    }

    #[test]
    fn trailing_bytes_after_last_entry() {
        let mut bytes = encode(&[(1, DiffChange::Removed)]);
        bytes.push(0xFF);
        let mut reader = DiffPayloadReader::new(&bytes).unwrap();
        assert!(reader.try_read_next().unwrap().is_some());
        assert!(matches!(
            reader.try_read_next(),
            Err(DecodeError::TrailingBytes { count: 1, .. })
        ));
    }

    #[test]
    fn misaligned_pointer_is_rejected() {
        let mut bytes = vec![0x01, 0x01, ValueType::Ptr64.as_tag()];
        bytes.extend_from_slice(&6u64.to_le_bytes());
        let mut reader = DiffPayloadReader::new(&bytes).unwrap();
        assert_eq!(
            reader.try_read_next(),
            Err(DecodeError::AddressAlignment { value: 6 })
        );
    }

    #[test]
    fn version_index_values() {
        assert_eq!(Some(ptr(16)).to_value(), Value::Ptr(ptr(16)));
        assert_eq!(None::<Ptr64>.to_value(), Value::Null);
        assert_eq!(<Option<Ptr64>>::from_value(Value::Null), Ok(None));
        assert_eq!(
            <Option<Ptr64>>::from_value(Value::Int(3)),
            Err(DecodeError::ValueTypeMismatch {
                expected: "Ptr64 or Null",
                found: "VarInt"
            })
        );
    }
}
