use rand::RngCore;
use rmpv::Value;
use saltpack_core::{MessageMode, SaltpackResult};

use crate::codec;
use crate::header::{check_mode, decode_outer, encode_header, EncodedHeader};
use crate::keys::SigningPublicKey;

/// Size of the random header nonce
pub const SIGNING_NONCE_SIZE: usize = 32;

/// Header of a signed message (mode 1 attached, mode 2 detached).
#[derive(Debug, Clone)]
pub struct SignedMessageHeader {
    public_key: SigningPublicKey,
    nonce: [u8; SIGNING_NONCE_SIZE],
    attached: bool,
    encoded: EncodedHeader,
}

impl SignedMessageHeader {
    pub fn create(
        public_key: SigningPublicKey,
        nonce: [u8; SIGNING_NONCE_SIZE],
        attached: bool,
    ) -> SaltpackResult<Self> {
        let mode = if attached {
            MessageMode::AttachedSigning
        } else {
            MessageMode::DetachedSigning
        };
        let encoded = encode_header(
            mode,
            vec![
                Value::Binary(public_key.as_bytes().to_vec()),
                Value::Binary(nonce.to_vec()),
            ],
        )?;
        Ok(Self {
            public_key,
            nonce,
            attached,
            encoded,
        })
    }

    pub fn decode(bytes: &[u8], already_unwrapped: bool) -> SaltpackResult<Self> {
        let decoded = decode_outer(bytes, already_unwrapped)?;
        let items = &decoded.items;
        let mode = check_mode(
            items,
            &[MessageMode::AttachedSigning, MessageMode::DetachedSigning],
            5,
        )?;

        let public_key = SigningPublicKey::from_bytes(codec::bin_exact(&items[3], "signing public key")?);
        let nonce = codec::bin_exact(&items[4], "signing nonce")?;
        tracing::debug!(?mode, "signing header decoded");

        Ok(Self {
            public_key,
            nonce,
            attached: mode == MessageMode::AttachedSigning,
            encoded: decoded.encoded,
        })
    }

    pub fn public_key(&self) -> SigningPublicKey {
        self.public_key
    }

    pub fn nonce(&self) -> &[u8; SIGNING_NONCE_SIZE] {
        &self.nonce
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn header_hash(&self) -> &[u8; 64] {
        self.encoded.hash()
    }

    pub fn encoded(&self) -> &[u8] {
        self.encoded.encoded()
    }

    pub(crate) fn encoded_header(&self) -> &EncodedHeader {
        &self.encoded
    }
}

pub(crate) fn random_nonce() -> [u8; SIGNING_NONCE_SIZE] {
    let mut nonce = [0u8; SIGNING_NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SigningKeyPair;

    #[test]
    fn attached_and_detached_headers_decode() {
        let key = SigningKeyPair::generate().public_key();
        for attached in [true, false] {
            let header = SignedMessageHeader::create(key, [9; 32], attached).unwrap();
            let decoded = SignedMessageHeader::decode(header.encoded(), false).unwrap();
            assert_eq!(decoded.public_key(), key);
            assert_eq!(decoded.nonce(), &[9; 32]);
            assert_eq!(decoded.is_attached(), attached);
            assert_eq!(decoded.header_hash(), header.header_hash());
        }
    }

    #[test]
    fn encryption_header_is_rejected() {
        let header = encode_header(
            MessageMode::Encryption,
            vec![Value::Binary(vec![0; 32]), Value::Binary(vec![0; 32])],
        )
        .unwrap();
        assert!(SignedMessageHeader::decode(header.encoded(), false).is_err());
    }

    #[test]
    fn nonces_are_random() {
        assert_ne!(random_nonce(), random_nonce());
    }
}
