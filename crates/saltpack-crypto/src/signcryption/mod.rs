//! Signcryption (mode 3)
//!
//! Like encryption, but each chunk is signed with the sender's Ed25519 key and the
//! signature travels inside the payload secretbox. Recipients are identified by an
//! opaque per-entry identifier rather than a public key, and can hold either a
//! Curve25519 keypair or a pre-shared symmetric key. An anonymous sender writes an
//! all-zero key and all-zero signatures.

mod header;
mod recipient;
mod stream;

pub use header::{SigncryptedMessageHeader, SigncryptedMessageRecipient};
pub use recipient::{
    RecipientKey, SigncryptRecipient, BOX_KEY_IDENTIFIER_HMAC_KEY, SYMMETRIC_KEY_HMAC_KEY,
};
pub use stream::{DesigncryptStream, SigncryptStream};

use saltpack_core::transform::run;
use saltpack_core::{SaltpackError, SaltpackResult};

use crate::keys::{MessageKeys, SigningKeyPair, SigningPublicKey};

pub const ENCRYPTED_SIGNATURE_PREFIX: &[u8] = b"saltpack encrypted signature\0";

/// Output of [`designcrypt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Designcrypted {
    pub data: Vec<u8>,
    /// `None` for an anonymous sender
    pub sender: Option<SigningPublicKey>,
}

pub fn signcrypt(
    message: &[u8],
    sender: Option<&SigningKeyPair>,
    recipients: &[SigncryptRecipient],
) -> SaltpackResult<Vec<u8>> {
    signcrypt_with_keys(message, sender, recipients, MessageKeys::generate())
}

pub fn signcrypt_with_keys(
    message: &[u8],
    sender: Option<&SigningKeyPair>,
    recipients: &[SigncryptRecipient],
    keys: MessageKeys,
) -> SaltpackResult<Vec<u8>> {
    run(&mut SigncryptStream::with_keys(sender, recipients, keys)?, message)
}

/// Open a complete signcrypted message with any of `keys`.
///
/// With `expected_sender`, a message signed by anyone else (or by nobody) fails with
/// [`SaltpackError::SenderMismatch`].
pub fn designcrypt(
    data: &[u8],
    keys: &[RecipientKey],
    expected_sender: Option<&SigningPublicKey>,
) -> SaltpackResult<Designcrypted> {
    let mut stream = DesigncryptStream::new(keys, expected_sender);
    let plaintext = run(&mut stream, data)?;
    if stream.header().is_none() {
        return Err(SaltpackError::truncation("message has no header"));
    }
    Ok(Designcrypted {
        data: plaintext,
        sender: stream.sender_public_key(),
    })
}
