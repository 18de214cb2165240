//! Multi-recipient public-key encryption (mode 0)
//!
//! The payload is secretboxed under a random payload key, which is boxed to each
//! recipient from an ephemeral keypair. Every payload packet carries one HMAC
//! authenticator per recipient, keyed from both the sender's and the ephemeral key,
//! so a recipient can check that the sender wrote each packet, not just that some
//! other recipient could have.

mod header;
mod stream;

pub use header::{EncryptedMessageHeader, EncryptedMessageRecipient, Recipient};
pub use stream::{DecryptStream, EncryptStream};

use saltpack_core::transform::run;
use saltpack_core::{SaltpackError, SaltpackResult};

use crate::keys::{BoxKeyPair, BoxPublicKey, MessageKeys};

/// Output of [`decrypt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub data: Vec<u8>,
    /// The sender's key, or the message's ephemeral key if the sender was anonymous
    pub sender: BoxPublicKey,
    pub anonymous_sender: bool,
}

/// Encrypt `message` with a fresh payload key and ephemeral keypair.
pub fn encrypt(
    message: &[u8],
    sender: Option<&BoxKeyPair>,
    recipients: &[Recipient],
) -> SaltpackResult<Vec<u8>> {
    encrypt_with_keys(message, sender, recipients, MessageKeys::generate())
}

/// Encrypt `message` with caller-supplied per-message keys.
pub fn encrypt_with_keys(
    message: &[u8],
    sender: Option<&BoxKeyPair>,
    recipients: &[Recipient],
    keys: MessageKeys,
) -> SaltpackResult<Vec<u8>> {
    let mut stream = EncryptStream::with_keys(sender, recipients, keys)?;
    run(&mut stream, message)
}

/// Decrypt a complete message.
///
/// With `expected_sender`, a message from anyone else fails with
/// [`SaltpackError::SenderMismatch`] before any plaintext is produced.
pub fn decrypt(
    data: &[u8],
    keypair: &BoxKeyPair,
    expected_sender: Option<&BoxPublicKey>,
) -> SaltpackResult<Decrypted> {
    let mut stream = DecryptStream::new(keypair, expected_sender);
    let plaintext = run(&mut stream, data)?;
    let (Some(sender), Some(anonymous_sender)) =
        (stream.sender_public_key(), stream.is_anonymous_sender())
    else {
        return Err(SaltpackError::truncation("message has no header"));
    };

    Ok(Decrypted {
        data: plaintext,
        sender,
        anonymous_sender,
    })
}
