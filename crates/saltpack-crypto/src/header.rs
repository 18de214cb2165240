//! Header framing shared by every message mode
//!
//! The header tuple is encoded once, hashed, and wrapped again as a msgpack `bin`:
//!
//! ```text
//! inner   = msgpack(["saltpack", [2, 0], mode, ...mode fields])
//! hash    = SHA-512(inner)
//! encoded = msgpack(bin(inner))
//! ```
//!
//! On decode the hash is taken over the inner bytes exactly as received, so a header
//! that some other encoder wrote less compactly still authenticates.

use rmpv::Value;
use saltpack_core::{MessageMode, SaltpackError, SaltpackResult};

use crate::codec;
use crate::nacl::sha512;

pub const FORMAT_NAME: &str = "saltpack";
pub const VERSION_MAJOR: u64 = 2;
pub const VERSION_MINOR: u64 = 0;

/// Hash and wire encoding of a header, computed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedHeader {
    hash: [u8; 64],
    encoded: Vec<u8>,
}

impl EncodedHeader {
    /// SHA-512 of the inner header encoding
    pub fn hash(&self) -> &[u8; 64] {
        &self.hash
    }

    /// The header as it appears on the wire (a msgpack `bin`)
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    fn from_inner(inner: &[u8]) -> SaltpackResult<Self> {
        Ok(Self {
            hash: sha512(&[inner]),
            encoded: codec::encode(&Value::Binary(inner.to_vec()))?,
        })
    }
}

/// Encode a header of `mode` with the mode-specific `fields` appended.
pub fn encode_header(mode: MessageMode, fields: Vec<Value>) -> SaltpackResult<EncodedHeader> {
    let mut items = Vec::with_capacity(3 + fields.len());
    items.push(Value::from(FORMAT_NAME));
    items.push(Value::Array(vec![
        Value::from(VERSION_MAJOR),
        Value::from(VERSION_MINOR),
    ]));
    items.push(Value::from(mode.as_u64()));
    items.extend(fields);

    let inner = codec::encode(&Value::Array(items))?;
    EncodedHeader::from_inner(&inner)
}

/// A decoded header: the common fields checked, the rest left to the mode.
#[derive(Debug, Clone)]
pub struct DecodedHeader {
    pub encoded: EncodedHeader,
    pub items: Vec<Value>,
}

/// Unwrap, hash and sanity-check a header.
///
/// With `already_unwrapped` the input is the inner encoding itself rather than the
/// `bin` object wrapping it. The mode is left unchecked; see [`check_mode`].
pub fn decode_outer(bytes: &[u8], already_unwrapped: bool) -> SaltpackResult<DecodedHeader> {
    let unwrapped;
    let inner: &[u8] = if already_unwrapped {
        bytes
    } else {
        unwrapped = match codec::decode(bytes)? {
            Value::Binary(inner) => inner,
            _ => return Err(SaltpackError::format("header must be a msgpack bin")),
        };
        &unwrapped
    };

    let encoded = EncodedHeader::from_inner(inner)?;
    let items = match codec::decode(inner)? {
        Value::Array(items) => items,
        _ => return Err(SaltpackError::format("header must be a msgpack array")),
    };

    if items.len() < 3 {
        return Err(SaltpackError::Format(format!(
            "header has {} elements, expected at least 3",
            items.len()
        )));
    }
    if items[0].as_str() != Some(FORMAT_NAME) {
        return Err(SaltpackError::format("not a saltpack message"));
    }

    let version = codec::array_exact(&items[1], 2, "header version")?;
    let major = codec::uint(&version[0], "major version")?;
    let minor = codec::uint(&version[1], "minor version")?;
    if (major, minor) != (VERSION_MAJOR, VERSION_MINOR) {
        return Err(SaltpackError::Format(format!(
            "unsupported saltpack version {major}.{minor}"
        )));
    }

    Ok(DecodedHeader { encoded, items })
}

/// Check the mode field against `allowed` and the tuple length against `len`.
pub fn check_mode(
    items: &[Value],
    allowed: &[MessageMode],
    len: usize,
) -> SaltpackResult<MessageMode> {
    let mode = MessageMode::from_u64(codec::uint(&items[2], "mode")?)?;
    if !allowed.contains(&mode) {
        return Err(SaltpackError::Format(format!(
            "unexpected message mode {mode:?}"
        )));
    }
    if items.len() != len {
        return Err(SaltpackError::Format(format!(
            "{mode:?} header has {} elements, expected {len}",
            items.len()
        )));
    }
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncodedHeader {
        encode_header(
            MessageMode::AttachedSigning,
            vec![Value::Binary(vec![1; 32]), Value::Binary(vec![0; 32])],
        )
        .unwrap()
    }

    #[test]
    fn encode_then_decode_keeps_hash() {
        let header = sample();
        let decoded = decode_outer(header.encoded(), false).unwrap();
        assert_eq!(decoded.encoded, header);
        assert_eq!(decoded.items.len(), 5);
        assert_eq!(
            check_mode(&decoded.items, &[MessageMode::AttachedSigning], 5).unwrap(),
            MessageMode::AttachedSigning
        );
    }

    #[test]
    fn hash_covers_inner_bytes_as_received() {
        let header = sample();
        let Value::Binary(inner) = codec::decode(header.encoded()).unwrap() else {
            panic!("not a bin");
        };
        assert_eq!(header.hash(), &sha512(&[&inner]));

        let decoded = decode_outer(&inner, true).unwrap();
        assert_eq!(decoded.encoded.hash(), header.hash());
    }

    #[test]
    fn non_compact_encoding_is_hashed_verbatim() {
        // ["saltpack", [2, 0], 1] with the mode as a uint16
        let mut inner = vec![0x93, 0xa8];
        inner.extend_from_slice(b"saltpack");
        inner.extend_from_slice(&[0x92, 0x02, 0x00, 0xcd, 0x00, 0x01]);

        let decoded = decode_outer(&inner, true).unwrap();
        assert_eq!(decoded.encoded.hash(), &sha512(&[&inner]));
        assert_eq!(codec::uint(&decoded.items[2], "mode").unwrap(), 1);
    }

    #[test]
    fn rejects_wrong_name_version_and_shape() {
        let wrong_name = codec::encode(&Value::Array(vec![
            Value::from("saltpeck"),
            Value::Array(vec![Value::from(2u64), Value::from(0u64)]),
            Value::from(0u64),
        ]))
        .unwrap();
        assert!(matches!(
            decode_outer(&wrong_name, true),
            Err(SaltpackError::Format(_))
        ));

        let wrong_version = codec::encode(&Value::Array(vec![
            Value::from("saltpack"),
            Value::Array(vec![Value::from(1u64), Value::from(0u64)]),
            Value::from(0u64),
        ]))
        .unwrap();
        let err = decode_outer(&wrong_version, true).unwrap_err();
        assert!(err.to_string().contains("1.0"));

        let too_short = codec::encode(&Value::Array(vec![Value::from("saltpack")])).unwrap();
        assert!(decode_outer(&too_short, true).is_err());

        // Not wrapped in a bin
        assert!(decode_outer(&wrong_name, false).is_err());
    }

    #[test]
    fn check_mode_is_strict() {
        let decoded = decode_outer(sample().encoded(), false).unwrap();
        assert!(check_mode(&decoded.items, &[MessageMode::Encryption], 5).is_err());
        assert!(check_mode(&decoded.items, &[MessageMode::AttachedSigning], 6).is_err());
    }
}
