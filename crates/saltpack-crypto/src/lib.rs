//! saltpack-crypto: message engines for the saltpack v2 format
//!
//! # Overview
//! - `keys`: Curve25519 and Ed25519 key newtypes (secrets zeroized on drop)
//! - `nacl`: box/secretbox wrappers, saltpack nonces, SHA-512 and HMAC helpers
//! - `codec`: msgpack encode/decode and an incremental object decoder
//! - `header`: header wrapping, hashing and common field checks
//! - `packet` (internal): chunked packet writer and lookahead packet reader shared by every mode
//! - `encryption`: multi-recipient encryption with per-recipient authenticators
//! - `signing`: attached and detached Ed25519 signatures
//! - `signcryption`: sign-then-encrypt with Curve25519 and symmetric-key recipients
//! - `with_armor`: encrypt/sign/signcrypt composed with ASCII armor
//! - `paperkey`: scrypt-derived deterministic keypairs
//!
//! Every engine has a buffered function and a streaming [`saltpack_core::Transform`].
//! The buffered functions drive the streams, so both paths produce the same bytes.

pub mod codec;
pub mod encryption;
pub mod header;
pub mod keys;
pub mod nacl;
mod packet;
pub mod paperkey;
pub mod signcryption;
pub mod signing;
pub mod with_armor;

pub use encryption::{
    decrypt, encrypt, encrypt_with_keys, DecryptStream, Decrypted, EncryptStream,
    EncryptedMessageHeader, Recipient,
};
pub use keys::{
    BoxKeyPair, BoxPublicKey, BoxSecretKey, MessageKeys, PayloadKey, SigningKeyPair,
    SigningPublicKey, SymmetricKey,
};
pub use paperkey::{PaperKey, PaperKeyParams};
pub use signcryption::{
    designcrypt, signcrypt, signcrypt_with_keys, DesigncryptStream, Designcrypted, RecipientKey,
    SigncryptRecipient, SigncryptStream, SigncryptedMessageHeader,
};
pub use signing::{
    sign, sign_detached, sign_detached_with_nonce, sign_with_nonce, verify, verify_detached,
    SignStream, SignedMessageHeader, Verified, VerifyStream,
};

/// Curve25519, Ed25519, payload and MAC key size
pub const KEY_SIZE: usize = 32;

/// Ed25519 signature size
pub const SIGNATURE_SIZE: usize = 64;

/// Poly1305 tag size prepended by box and secretbox
pub const TAG_SIZE: usize = 16;

/// XSalsa20 nonce size
pub const NONCE_SIZE: usize = 24;

/// Plaintext bytes carried by each payload packet (1 MiB)
pub const CHUNK_SIZE: usize = 1024 * 1024;
