use saltpack_core::{SaltpackError, SaltpackResult};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::header::SigncryptedMessageHeader;
use crate::keys::{BoxKeyPair, BoxPublicKey, BoxSecretKey, PayloadKey, SymmetricKey};
use crate::nacl::{self, NonceBytes, SharedBox, DERIVED_SBOX_KEY_NONCE};
use crate::{KEY_SIZE, TAG_SIZE};

/// HMAC key for recipient identifiers
pub const BOX_KEY_IDENTIFIER_HMAC_KEY: &[u8] = b"saltpack signcryption box key identifier";

/// HMAC key for deriving a symmetric recipient's shared key
pub const SYMMETRIC_KEY_HMAC_KEY: &[u8] = b"saltpack signcryption symmetric key";

/// A signcryption recipient as chosen by the sender.
#[derive(Debug, Clone)]
pub enum SigncryptRecipient {
    Curve25519(BoxPublicKey),
    Symmetric(SymmetricKey),
}

impl SigncryptRecipient {
    /// Key that boxes this recipient's copy of the payload key
    pub(crate) fn shared_key(&self, ephemeral: &BoxKeyPair) -> SaltpackResult<SymmetricKey> {
        match self {
            SigncryptRecipient::Curve25519(public) => {
                curve25519_shared_key(public, ephemeral.secret_key())
            }
            SigncryptRecipient::Symmetric(key) => {
                symmetric_shared_key(&ephemeral.public_key(), key)
            }
        }
    }
}

impl From<BoxPublicKey> for SigncryptRecipient {
    fn from(public: BoxPublicKey) -> Self {
        SigncryptRecipient::Curve25519(public)
    }
}

/// A key the receiver holds for opening signcrypted messages.
#[derive(Debug, Clone)]
pub enum RecipientKey {
    Curve25519(BoxKeyPair),
    /// A pre-shared key. With `identifier`, only the entry carrying that identifier is
    /// tried; without it every entry is trial-decrypted.
    Symmetric {
        key: SymmetricKey,
        identifier: Option<[u8; 32]>,
    },
}

impl RecipientKey {
    pub fn symmetric(key: SymmetricKey) -> Self {
        RecipientKey::Symmetric {
            key,
            identifier: None,
        }
    }

    /// Look for this key's entry in `header` and open its payload key box.
    ///
    /// `Ok(None)` means no entry belongs to this key. A Curve25519 entry whose
    /// identifier matches but whose box doesn't open is an authentication failure.
    pub fn attempt_decrypt(
        &self,
        header: &SigncryptedMessageHeader,
    ) -> SaltpackResult<Option<(PayloadKey, u64)>> {
        match self {
            RecipientKey::Curve25519(keypair) => {
                let shared =
                    curve25519_shared_key(&header.ephemeral_public_key(), keypair.secret_key())?;
                for recipient in header.recipients() {
                    let nonce = recipient.nonce();
                    let identifier = recipient_identifier(&shared, &nonce)?;
                    if !bool::from(identifier[..].ct_eq(&recipient.identifier()[..])) {
                        continue;
                    }
                    return match open_payload_key(&shared, &nonce, recipient.payload_key_box()) {
                        Some(key) => Ok(Some((key, recipient.index()))),
                        None => Err(SaltpackError::authentication(
                            "payload key box failed to open for a matching recipient identifier",
                        )),
                    };
                }
                Ok(None)
            }
            RecipientKey::Symmetric { key, identifier } => {
                let shared = symmetric_shared_key(&header.ephemeral_public_key(), key)?;
                let candidates = header.recipients().iter().filter(|recipient| {
                    identifier.map_or(true, |id| id == *recipient.identifier())
                });
                for recipient in candidates {
                    if let Some(key) =
                        open_payload_key(&shared, &recipient.nonce(), recipient.payload_key_box())
                    {
                        return Ok(Some((key, recipient.index())));
                    }
                }
                Ok(None)
            }
        }
    }
}

impl From<BoxKeyPair> for RecipientKey {
    fn from(keypair: BoxKeyPair) -> Self {
        RecipientKey::Curve25519(keypair)
    }
}

fn open_payload_key(shared: &SymmetricKey, nonce: &NonceBytes, boxed: &[u8]) -> Option<PayloadKey> {
    let mut opened = nacl::secretbox_open(shared.as_bytes(), nonce, boxed)?;
    let key = PayloadKey::from_slice(&opened).ok();
    opened.zeroize();
    key
}

/// `box(0^32, "saltpack_derived_sboxkey", public, secret)[-32:]`
pub(crate) fn curve25519_shared_key(
    public: &BoxPublicKey,
    secret: &BoxSecretKey,
) -> SaltpackResult<SymmetricKey> {
    let mut boxed = SharedBox::new(public, secret).seal(DERIVED_SBOX_KEY_NONCE, &[0u8; KEY_SIZE])?;
    let key = SymmetricKey::from_slice(&boxed[TAG_SIZE..]);
    boxed.zeroize();
    key
}

/// `HMAC-SHA512("saltpack signcryption symmetric key", ephemeral_public || key)[..32]`
pub(crate) fn symmetric_shared_key(
    ephemeral_public: &BoxPublicKey,
    key: &SymmetricKey,
) -> SaltpackResult<SymmetricKey> {
    nacl::hmac_sha512_32(
        SYMMETRIC_KEY_HMAC_KEY,
        &[ephemeral_public.as_bytes(), key.as_bytes()],
    )
    .map(SymmetricKey::from_bytes)
}

/// `HMAC-SHA512("saltpack signcryption box key identifier", shared || nonce)[..32]`
pub(crate) fn recipient_identifier(
    shared: &SymmetricKey,
    nonce: &NonceBytes,
) -> SaltpackResult<[u8; 32]> {
    nacl::hmac_sha512_32(BOX_KEY_IDENTIFIER_HMAC_KEY, &[shared.as_bytes(), nonce])
}
