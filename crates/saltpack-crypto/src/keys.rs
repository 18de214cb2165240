//! Key types used by the message engines
//!
//! Public keys are plain `Copy` values. Secret material (box secret keys, Ed25519
//! seeds, payload keys, symmetric keys, MAC keys) lives in newtypes that zeroize on
//! drop and redact themselves in `Debug` output.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use saltpack_core::{SaltpackError, SaltpackResult};
use zeroize::{Zeroize, Zeroizing};

use crate::{KEY_SIZE, SIGNATURE_SIZE};

fn fmt_hex(f: &mut std::fmt::Formatter<'_>, name: &str, bytes: &[u8]) -> std::fmt::Result {
    write!(f, "{name}(")?;
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    write!(f, ")")
}

fn array_from_slice(bytes: &[u8], what: &str) -> SaltpackResult<[u8; KEY_SIZE]> {
    bytes.try_into().map_err(|_| {
        SaltpackError::Crypto(format!(
            "{what} must be {KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })
}

fn random_bytes() -> [u8; KEY_SIZE] {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Defines a 32-byte secret that is zeroized on drop and never printed.
macro_rules! secret_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            bytes: [u8; KEY_SIZE],
        }

        impl $name {
            pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
                Self { bytes }
            }

            pub fn from_slice(bytes: &[u8]) -> SaltpackResult<Self> {
                array_from_slice(bytes, stringify!($name)).map(Self::from_bytes)
            }

            pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
                &self.bytes
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.bytes.zeroize();
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("bytes", &"[REDACTED]")
                    .finish()
            }
        }
    };
}

secret_key!(
    /// A Curve25519 secret key.
    BoxSecretKey
);

secret_key!(
    /// The per-message key that secretboxes every payload packet.
    PayloadKey
);

secret_key!(
    /// A pre-shared 32-byte key for a signcryption recipient.
    SymmetricKey
);

secret_key!(
    /// Per-recipient key for encryption payload authenticators.
    MacKey
);

impl BoxSecretKey {
    pub fn generate() -> Self {
        Self::from_bytes(random_bytes())
    }

    pub fn public_key(&self) -> BoxPublicKey {
        BoxPublicKey(*self.to_crypto().public_key().as_bytes())
    }

    pub(crate) fn to_crypto(&self) -> crypto_box::SecretKey {
        crypto_box::SecretKey::from_bytes(self.bytes)
    }
}

impl PayloadKey {
    pub fn generate() -> Self {
        Self::from_bytes(random_bytes())
    }
}

impl SymmetricKey {
    pub fn generate() -> Self {
        Self::from_bytes(random_bytes())
    }
}

/// A Curve25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxPublicKey([u8; KEY_SIZE]);

impl BoxPublicKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> SaltpackResult<Self> {
        array_from_slice(bytes, "box public key").map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub(crate) fn to_crypto(self) -> crypto_box::PublicKey {
        crypto_box::PublicKey::from_bytes(self.0)
    }
}

impl std::fmt::Debug for BoxPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_hex(f, "BoxPublicKey", &self.0)
    }
}

/// A Curve25519 keypair.
#[derive(Clone, Debug)]
pub struct BoxKeyPair {
    secret: BoxSecretKey,
    public: BoxPublicKey,
}

impl BoxKeyPair {
    pub fn generate() -> Self {
        Self::from_secret(BoxSecretKey::generate())
    }

    pub fn from_secret(secret: BoxSecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public_key(&self) -> BoxPublicKey {
        self.public
    }

    pub fn secret_key(&self) -> &BoxSecretKey {
        &self.secret
    }
}

/// An Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigningPublicKey([u8; KEY_SIZE]);

impl SigningPublicKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> SaltpackResult<Self> {
        array_from_slice(bytes, "signing public key").map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// All-zero keys stand for an anonymous signcryption sender
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; KEY_SIZE]
    }

    pub(crate) fn verifying_key(&self) -> SaltpackResult<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0)
            .map_err(|e| SaltpackError::Crypto(format!("invalid Ed25519 public key: {e}")))
    }

    /// Check `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_SIZE]) -> SaltpackResult<()> {
        let signature = Signature::from_bytes(signature);
        self.verifying_key()?
            .verify(message, &signature)
            .map_err(|_| SaltpackError::authentication("invalid signature"))
    }
}

impl std::fmt::Debug for SigningPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_hex(f, "SigningPublicKey", &self.0)
    }
}

/// An Ed25519 keypair built from a 32-byte seed.
#[derive(Clone)]
pub struct SigningKeyPair {
    key: SigningKey,
    public: SigningPublicKey,
}

impl SigningKeyPair {
    pub fn from_seed(seed: &[u8; KEY_SIZE]) -> Self {
        let key = SigningKey::from_bytes(seed);
        let public = SigningPublicKey(key.verifying_key().to_bytes());
        Self { key, public }
    }

    pub fn generate() -> Self {
        let mut seed = random_bytes();
        let pair = Self::from_seed(&seed);
        seed.zeroize();
        pair
    }

    pub fn public_key(&self) -> SigningPublicKey {
        self.public
    }

    /// The 32-byte seed this keypair was built from
    pub fn to_seed(&self) -> Zeroizing<[u8; KEY_SIZE]> {
        Zeroizing::new(self.key.to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("public", &self.public)
            .field("seed", &"[REDACTED]")
            .finish()
    }
}

/// Per-message randomness for encryption and signcryption.
///
/// Normally generated fresh for every message. Tests and fixtures inject fixed values
/// to get reproducible output.
#[derive(Debug, Clone)]
pub struct MessageKeys {
    pub payload_key: PayloadKey,
    pub ephemeral: BoxKeyPair,
}

impl MessageKeys {
    pub fn generate() -> Self {
        Self {
            payload_key: PayloadKey::generate(),
            ephemeral: BoxKeyPair::generate(),
        }
    }
}
