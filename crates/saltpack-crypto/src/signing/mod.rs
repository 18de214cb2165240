//! Ed25519 signing, attached (mode 1) and detached (mode 2)
//!
//! Attached messages interleave the payload with one signature per chunk. Each
//! signature covers the header hash, the chunk index and the final flag, so packets
//! can't be reordered, dropped or moved between messages. A detached signature is the
//! header followed by a single signature over the whole message.

mod header;
mod stream;

pub use header::{SignedMessageHeader, SIGNING_NONCE_SIZE};
pub use stream::{SignStream, VerifyStream};

use rmpv::Value;
use saltpack_core::transform::run;
use saltpack_core::{SaltpackError, SaltpackResult};

use crate::codec::{self, ObjectDecoder};
use crate::keys::{SigningKeyPair, SigningPublicKey};
use crate::nacl;
use crate::SIGNATURE_SIZE;

pub const ATTACHED_SIGNATURE_PREFIX: &[u8] = b"saltpack attached signature\0";
pub const DETACHED_SIGNATURE_PREFIX: &[u8] = b"saltpack detached signature\0";

/// Output of [`verify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub data: Vec<u8>,
    /// The key the signatures were checked against
    pub public_key: SigningPublicKey,
}

pub fn sign(message: &[u8], keypair: &SigningKeyPair) -> SaltpackResult<Vec<u8>> {
    run(&mut SignStream::new(keypair)?, message)
}

pub fn sign_with_nonce(
    message: &[u8],
    keypair: &SigningKeyPair,
    nonce: [u8; SIGNING_NONCE_SIZE],
) -> SaltpackResult<Vec<u8>> {
    run(&mut SignStream::with_nonce(keypair, nonce)?, message)
}

/// Verify an attached signature and return the signed data.
pub fn verify(signed: &[u8], expected: Option<&SigningPublicKey>) -> SaltpackResult<Verified> {
    let mut stream = VerifyStream::new(expected);
    let data = run(&mut stream, signed)?;
    let public_key = stream
        .public_key()
        .ok_or_else(|| SaltpackError::truncation("message has no header"))?;
    Ok(Verified { data, public_key })
}

/// `prefix || SHA512(header_hash || message)`
fn detached_signature_input(header_hash: &[u8; 64], message: &[u8]) -> Vec<u8> {
    let digest = nacl::sha512(&[header_hash, message]);
    [DETACHED_SIGNATURE_PREFIX, &digest[..]].concat()
}

pub fn sign_detached(message: &[u8], keypair: &SigningKeyPair) -> SaltpackResult<Vec<u8>> {
    sign_detached_with_nonce(message, keypair, header::random_nonce())
}

/// Detached signature: the encoded header followed by a msgpack `bin` signature.
pub fn sign_detached_with_nonce(
    message: &[u8],
    keypair: &SigningKeyPair,
    nonce: [u8; SIGNING_NONCE_SIZE],
) -> SaltpackResult<Vec<u8>> {
    let header = SignedMessageHeader::create(keypair.public_key(), nonce, false)?;
    let signature = keypair.sign(&detached_signature_input(header.header_hash(), message));

    let mut out = header.encoded().to_vec();
    out.extend(codec::encode(&Value::Binary(signature.to_vec()))?);
    Ok(out)
}

/// Check a detached signature over `message`; returns the key it was checked against.
pub fn verify_detached(
    signature: &[u8],
    message: &[u8],
    expected: Option<&SigningPublicKey>,
) -> SaltpackResult<SigningPublicKey> {
    let mut decoder = ObjectDecoder::new();
    decoder.push(signature);
    let header_bytes = decoder
        .next_object()?
        .ok_or_else(|| SaltpackError::truncation("detached signature has no header"))?;
    let signature_bytes = decoder
        .next_object()?
        .ok_or_else(|| SaltpackError::truncation("detached signature is missing"))?;
    if decoder.remaining() > 0 {
        return Err(SaltpackError::Format(format!(
            "{} trailing bytes after detached signature",
            decoder.remaining()
        )));
    }

    let header = SignedMessageHeader::decode(&header_bytes, false)?;
    if header.is_attached() {
        return Err(SaltpackError::format(
            "expected a detached signature, found an attached one",
        ));
    }
    let signature =
        codec::bin_exact::<SIGNATURE_SIZE>(&codec::decode(&signature_bytes)?, "signature")?;

    let public_key = expected.copied().unwrap_or(header.public_key());
    public_key.verify(
        &detached_signature_input(header.header_hash(), message),
        &signature,
    )?;
    tracing::debug!("detached signature verified");
    Ok(public_key)
}
