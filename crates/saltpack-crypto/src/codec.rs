//! msgpack encoding and incremental decoding
//!
//! Saltpack messages are a sequence of top-level msgpack objects: the header (a `bin`
//! wrapping the encoded header tuple) followed by payload packets. [`ObjectDecoder`]
//! splits arbitrarily chunked input into those objects without decoding them.
//! [`encoded_len`] only walks markers and length prefixes, so a hostile length never
//! allocates anything.

use rmp::Marker;
use rmpv::Value;
use saltpack_core::{SaltpackError, SaltpackResult};

pub fn encode(value: &Value) -> SaltpackResult<Vec<u8>> {
    let mut out = Vec::new();
    rmpv::encode::write_value(&mut out, value)
        .map_err(|e| SaltpackError::Format(format!("msgpack encoding failed: {e}")))?;
    Ok(out)
}

/// Decode exactly one object; trailing bytes are an error.
pub fn decode(bytes: &[u8]) -> SaltpackResult<Value> {
    let mut cursor = bytes;
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|e| SaltpackError::Format(format!("invalid msgpack: {e}")))?;
    if !cursor.is_empty() {
        return Err(SaltpackError::Format(format!(
            "{} trailing bytes after msgpack object",
            cursor.len()
        )));
    }
    Ok(value)
}

/// Length of the first complete msgpack object in `buf`.
///
/// `Ok(None)` means more input is needed.
pub fn encoded_len(buf: &[u8]) -> SaltpackResult<Option<usize>> {
    let mut pos = 0usize;
    let mut pending = 1u64;

    while pending > 0 {
        let Some(&byte) = buf.get(pos) else {
            return Ok(None);
        };
        pos += 1;
        pending -= 1;

        let (skip, children) = match Marker::from_u8(byte) {
            Marker::FixPos(_) | Marker::FixNeg(_) | Marker::Null | Marker::True | Marker::False => {
                (Length::Fixed(0), Length::Fixed(0))
            }
            Marker::U8 | Marker::I8 => (Length::Fixed(1), Length::Fixed(0)),
            Marker::U16 | Marker::I16 => (Length::Fixed(2), Length::Fixed(0)),
            Marker::U32 | Marker::I32 | Marker::F32 => (Length::Fixed(4), Length::Fixed(0)),
            Marker::U64 | Marker::I64 | Marker::F64 => (Length::Fixed(8), Length::Fixed(0)),
            Marker::FixStr(n) => (Length::Fixed(u64::from(n)), Length::Fixed(0)),
            Marker::Str8 | Marker::Bin8 => (Length::prefixed(1, 1, 0), Length::Fixed(0)),
            Marker::Str16 | Marker::Bin16 => (Length::prefixed(2, 1, 0), Length::Fixed(0)),
            Marker::Str32 | Marker::Bin32 => (Length::prefixed(4, 1, 0), Length::Fixed(0)),
            // One type byte plus the data
            Marker::FixExt1 => (Length::Fixed(2), Length::Fixed(0)),
            Marker::FixExt2 => (Length::Fixed(3), Length::Fixed(0)),
            Marker::FixExt4 => (Length::Fixed(5), Length::Fixed(0)),
            Marker::FixExt8 => (Length::Fixed(9), Length::Fixed(0)),
            Marker::FixExt16 => (Length::Fixed(17), Length::Fixed(0)),
            Marker::Ext8 => (Length::prefixed(1, 1, 1), Length::Fixed(0)),
            Marker::Ext16 => (Length::prefixed(2, 1, 1), Length::Fixed(0)),
            Marker::Ext32 => (Length::prefixed(4, 1, 1), Length::Fixed(0)),
            Marker::FixArray(n) => (Length::Fixed(0), Length::Fixed(u64::from(n))),
            Marker::FixMap(n) => (Length::Fixed(0), Length::Fixed(2 * u64::from(n))),
            Marker::Array16 => (Length::Fixed(0), Length::prefixed(2, 1, 0)),
            Marker::Array32 => (Length::Fixed(0), Length::prefixed(4, 1, 0)),
            Marker::Map16 => (Length::Fixed(0), Length::prefixed(2, 2, 0)),
            Marker::Map32 => (Length::Fixed(0), Length::prefixed(4, 2, 0)),
            Marker::Reserved => {
                return Err(SaltpackError::Format(format!(
                    "reserved msgpack marker 0x{byte:02x}"
                )))
            }
        };

        // A collection's count prefix comes before its entries
        let Some(children) = children.read(buf, &mut pos) else {
            return Ok(None);
        };
        let Some(skip) = skip.read(buf, &mut pos) else {
            return Ok(None);
        };

        pos = usize::try_from(skip)
            .ok()
            .and_then(|skip| pos.checked_add(skip))
            .ok_or_else(|| SaltpackError::format("msgpack length overflows"))?;
        pending = pending
            .checked_add(children)
            .ok_or_else(|| SaltpackError::format("msgpack length overflows"))?;
    }

    if pos > buf.len() {
        return Ok(None);
    }
    Ok(Some(pos))
}

/// A byte or element count, either implied by the marker or read from the input
#[derive(Clone, Copy)]
enum Length {
    Fixed(u64),
    /// Big-endian count of `width` bytes, scaled by `scale`, plus `extra`
    Prefixed { width: usize, scale: u64, extra: u64 },
}

impl Length {
    fn prefixed(width: usize, scale: u64, extra: u64) -> Self {
        Length::Prefixed {
            width,
            scale,
            extra,
        }
    }

    /// `None` when the prefix is not buffered yet
    fn read(self, buf: &[u8], pos: &mut usize) -> Option<u64> {
        match self {
            Length::Fixed(n) => Some(n),
            Length::Prefixed {
                width,
                scale,
                extra,
            } => {
                let bytes = buf.get(*pos..pos.checked_add(width)?)?;
                *pos += width;
                let n = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
                Some(n * scale + extra)
            }
        }
    }
}

/// Splits pushed bytes into complete top-level msgpack objects.
#[derive(Debug, Default)]
pub struct ObjectDecoder {
    buffer: Vec<u8>,
    start: usize,
}

impl ObjectDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if self.start > 0 && self.start == self.buffer.len() {
            self.buffer.clear();
            self.start = 0;
        }
        self.buffer.extend_from_slice(bytes);
    }

    /// The raw bytes of the next complete object, if one is buffered.
    pub fn next_object(&mut self) -> SaltpackResult<Option<Vec<u8>>> {
        let pending = &self.buffer[self.start..];
        let Some(len) = encoded_len(pending)? else {
            return Ok(None);
        };
        let object = pending[..len].to_vec();
        self.start += len;

        if self.start > self.buffer.len() / 2 {
            self.buffer.drain(..self.start);
            self.start = 0;
        }
        Ok(Some(object))
    }

    /// Buffered bytes not yet returned as an object
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.start
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Boolean(_) => "bool",
        Value::Integer(_) => "int",
        Value::F32(_) | Value::F64(_) => "float",
        Value::String(_) => "str",
        Value::Binary(_) => "bin",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Ext(..) => "ext",
    }
}

fn wrong_type(what: &str, expected: &str, value: &Value) -> SaltpackError {
    SaltpackError::Format(format!(
        "{what} must be {expected}, found {}",
        describe(value)
    ))
}

pub(crate) fn array<'a>(value: &'a Value, what: &str) -> SaltpackResult<&'a [Value]> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(wrong_type(what, "an array", other)),
    }
}

pub(crate) fn array_exact<'a>(
    value: &'a Value,
    len: usize,
    what: &str,
) -> SaltpackResult<&'a [Value]> {
    let items = array(value, what)?;
    if items.len() != len {
        return Err(SaltpackError::Format(format!(
            "{what} must have {len} elements, found {}",
            items.len()
        )));
    }
    Ok(items)
}

pub(crate) fn bin<'a>(value: &'a Value, what: &str) -> SaltpackResult<&'a [u8]> {
    match value {
        Value::Binary(bytes) => Ok(bytes),
        other => Err(wrong_type(what, "bin", other)),
    }
}

pub(crate) fn bin_exact<const N: usize>(value: &Value, what: &str) -> SaltpackResult<[u8; N]> {
    let bytes = bin(value, what)?;
    bytes.try_into().map_err(|_| {
        SaltpackError::Format(format!("{what} must be {N} bytes, found {}", bytes.len()))
    })
}

pub(crate) fn boolean(value: &Value, what: &str) -> SaltpackResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| wrong_type(what, "a bool", value))
}

pub(crate) fn uint(value: &Value, what: &str) -> SaltpackResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| wrong_type(what, "an unsigned int", value))
}
