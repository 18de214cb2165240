//! NaCl primitives with saltpack's nonce conventions
//!
//! `box` and `secretbox` output is the 16-byte Poly1305 tag followed by the ciphertext,
//! the same layout as libsodium's `crypto_box_easy` / `crypto_secretbox_easy`.

use crypto_box::SalsaBox;
use crypto_secretbox::aead::generic_array::GenericArray;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use hmac::{Hmac, Mac};
use saltpack_core::{SaltpackError, SaltpackResult};
use sha2::{Digest, Sha512};

use crate::keys::{BoxPublicKey, BoxSecretKey};
use crate::{KEY_SIZE, NONCE_SIZE};

pub type NonceBytes = [u8; NONCE_SIZE];

/// Nonce for the sender secretbox in encryption and signcryption headers
pub const SENDER_KEY_SECRETBOX_NONCE: &NonceBytes = b"saltpack_sender_key_sbox";

/// Prefix of the per-recipient payload key box nonce
pub const PAYLOAD_KEY_BOX_NONCE_PREFIX: &[u8; 16] = b"saltpack_recipsb";

/// Prefix of the encryption payload secretbox nonce
pub const PAYLOAD_NONCE_PREFIX: &[u8; 16] = b"saltpack_ploadsb";

/// Nonce for deriving a signcryption recipient's shared key
pub const DERIVED_SBOX_KEY_NONCE: &NonceBytes = b"saltpack_derived_sboxkey";

/// `prefix || be64(index)`
pub fn prefixed_nonce(prefix: &[u8; 16], index: u64) -> NonceBytes {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..16].copy_from_slice(prefix);
    nonce[16..].copy_from_slice(&index.to_be_bytes());
    nonce
}

pub fn secretbox_seal(
    key: &[u8; KEY_SIZE],
    nonce: &NonceBytes,
    message: &[u8],
) -> SaltpackResult<Vec<u8>> {
    XSalsa20Poly1305::new(GenericArray::from_slice(key))
        .encrypt(GenericArray::from_slice(nonce), message)
        .map_err(|e| SaltpackError::Crypto(format!("secretbox failed: {e}")))
}

/// `None` when the tag doesn't verify
pub fn secretbox_open(key: &[u8; KEY_SIZE], nonce: &NonceBytes, boxed: &[u8]) -> Option<Vec<u8>> {
    XSalsa20Poly1305::new(GenericArray::from_slice(key))
        .decrypt(GenericArray::from_slice(nonce), boxed)
        .ok()
}

/// A Curve25519 box with the shared secret precomputed.
pub struct SharedBox(SalsaBox);

impl SharedBox {
    pub fn new(public: &BoxPublicKey, secret: &BoxSecretKey) -> Self {
        Self(SalsaBox::new(&public.to_crypto(), &secret.to_crypto()))
    }

    pub fn seal(&self, nonce: &NonceBytes, message: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.0
            .encrypt(GenericArray::from_slice(nonce), message)
            .map_err(|e| SaltpackError::Crypto(format!("box failed: {e}")))
    }

    pub fn open(&self, nonce: &NonceBytes, boxed: &[u8]) -> Option<Vec<u8>> {
        self.0
            .decrypt(GenericArray::from_slice(nonce), boxed)
            .ok()
    }
}

impl std::fmt::Debug for SharedBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBox")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// SHA-512 over the concatenation of `parts`
pub fn sha512(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// First 32 bytes of HMAC-SHA512 over the concatenation of `parts`
pub fn hmac_sha512_32(key: &[u8], parts: &[&[u8]]) -> SaltpackResult<[u8; 32]> {
    let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(key)
        .map_err(|e| SaltpackError::Crypto(format!("HMAC key rejected: {e}")))?;
    for part in parts {
        mac.update(part);
    }
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::BoxKeyPair;

    #[test]
    fn nonce_layout() {
        let nonce = prefixed_nonce(PAYLOAD_NONCE_PREFIX, 0x0102);
        assert_eq!(&nonce[..16], b"saltpack_ploadsb");
        assert_eq!(&nonce[16..], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(SENDER_KEY_SECRETBOX_NONCE.len(), NONCE_SIZE);
        assert_eq!(DERIVED_SBOX_KEY_NONCE.len(), NONCE_SIZE);
    }

    #[test]
    fn secretbox_round_trip() {
        let key = [3u8; KEY_SIZE];
        let nonce = prefixed_nonce(PAYLOAD_NONCE_PREFIX, 9);
        let boxed = secretbox_seal(&key, &nonce, b"hello").unwrap();
        assert_eq!(boxed.len(), 5 + 16);
        assert_eq!(secretbox_open(&key, &nonce, &boxed).unwrap(), b"hello");

        let other = prefixed_nonce(PAYLOAD_NONCE_PREFIX, 10);
        assert!(secretbox_open(&key, &other, &boxed).is_none());
    }

    #[test]
    fn box_is_symmetric_between_peers() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let nonce = prefixed_nonce(PAYLOAD_KEY_BOX_NONCE_PREFIX, 0);

        let sealed = SharedBox::new(&bob.public_key(), alice.secret_key())
            .seal(&nonce, b"payload key")
            .unwrap();
        let opened = SharedBox::new(&alice.public_key(), bob.secret_key())
            .open(&nonce, &sealed)
            .unwrap();
        assert_eq!(opened, b"payload key");
    }

    #[test]
    fn hmac_truncates_to_32_bytes() {
        let a = hmac_sha512_32(b"key", &[b"ab", b"c"]).unwrap();
        let b = hmac_sha512_32(b"key", &[b"abc"]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, hmac_sha512_32(b"other", &[b"abc"]).unwrap());
    }
}
