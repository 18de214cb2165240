//! Paper keys: scrypt passphrase → deterministic signing and encryption keypairs
//!
//! The passphrase is stretched with scrypt (empty salt) to 128 bytes. Bytes 32..64
//! seed the Ed25519 keypair and bytes 64..96 are the Curve25519 secret key.

use std::sync::OnceLock;

use regex::Regex;
use saltpack_core::config::PaperKeyConfig;
use saltpack_core::{SaltpackError, SaltpackResult};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::keys::{BoxKeyPair, BoxSecretKey, SigningKeyPair};
use crate::KEY_SIZE;

const DERIVED_SIZE: usize = 128;
const SIGNING_SEED: std::ops::Range<usize> = 32..64;
const ENCRYPTION_SECRET: std::ops::Range<usize> = 64..96;

static LABEL_REGEX: OnceLock<Regex> = OnceLock::new();

/// scrypt cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperKeyParams {
    /// log2 of the CPU/memory cost N (default: 15 = 32768)
    pub log_n: u8,
    /// Block size (default: 8)
    pub r: u32,
    /// Parallelism (default: 1)
    pub p: u32,
}

impl Default for PaperKeyParams {
    fn default() -> Self {
        Self {
            log_n: 15,
            r: 8,
            p: 1,
        }
    }
}

impl From<&PaperKeyConfig> for PaperKeyParams {
    fn from(config: &PaperKeyConfig) -> Self {
        Self {
            log_n: config.scrypt_log_n,
            r: config.scrypt_r,
            p: config.scrypt_p,
        }
    }
}

/// Keypairs derived from a paper key passphrase.
#[derive(Debug, Clone)]
pub struct PaperKey {
    label: Option<String>,
    signing: SigningKeyPair,
    encryption: BoxKeyPair,
}

impl PaperKey {
    pub fn derive(passphrase: &SecretString, params: &PaperKeyParams) -> SaltpackResult<Self> {
        let scrypt_params = scrypt::Params::new(
            params.log_n,
            params.r,
            params.p,
            scrypt::Params::RECOMMENDED_LEN,
        )
        .map_err(|e| SaltpackError::Crypto(format!("invalid scrypt params: {e}")))?;

        let phrase = passphrase.expose_secret();
        let mut derived = [0u8; DERIVED_SIZE];
        scrypt::scrypt(phrase.as_bytes(), b"", &scrypt_params, &mut derived)
            .map_err(|e| SaltpackError::Crypto(format!("scrypt failed: {e}")))?;

        let mut seed = [0u8; KEY_SIZE];
        seed.copy_from_slice(&derived[SIGNING_SEED]);
        let signing = SigningKeyPair::from_seed(&seed);
        seed.zeroize();

        let mut secret = [0u8; KEY_SIZE];
        secret.copy_from_slice(&derived[ENCRYPTION_SECRET]);
        let encryption = BoxKeyPair::from_secret(BoxSecretKey::from_bytes(secret));
        secret.zeroize();
        derived.zeroize();

        Ok(Self {
            label: label(phrase),
            signing,
            encryption,
        })
    }

    /// The first two words of the phrase, if it starts with two lowercase words
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn signing_keypair(&self) -> &SigningKeyPair {
        &self.signing
    }

    pub fn encryption_keypair(&self) -> &BoxKeyPair {
        &self.encryption
    }
}

fn label(phrase: &str) -> Option<String> {
    let re = match LABEL_REGEX.get() {
        Some(re) => re,
        None => {
            let re = Regex::new(r"^([a-z]+ [a-z]+) ").ok()?;
            LABEL_REGEX.get_or_init(|| re)
        }
    };
    re.captures(phrase)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
