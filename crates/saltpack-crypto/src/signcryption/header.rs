use rmpv::Value;
use saltpack_core::{MessageMode, SaltpackError, SaltpackResult};

use super::recipient::{recipient_identifier, RecipientKey, SigncryptRecipient};
use crate::codec;
use crate::header::{check_mode, decode_outer, encode_header, EncodedHeader};
use crate::keys::{BoxPublicKey, MessageKeys, PayloadKey, SigningPublicKey};
use crate::nacl::{self, NonceBytes, PAYLOAD_KEY_BOX_NONCE_PREFIX, SENDER_KEY_SECRETBOX_NONCE};
use crate::{KEY_SIZE, TAG_SIZE};

const KEY_BOX_SIZE: usize = KEY_SIZE + TAG_SIZE;

/// One entry of the header's recipient list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigncryptedMessageRecipient {
    identifier: [u8; 32],
    payload_key_box: Vec<u8>,
    index: u64,
}

impl SigncryptedMessageRecipient {
    pub fn identifier(&self) -> &[u8; 32] {
        &self.identifier
    }

    pub fn payload_key_box(&self) -> &[u8] {
        &self.payload_key_box
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// `"saltpack_recipsb" || be64(index)`
    pub fn nonce(&self) -> NonceBytes {
        nacl::prefixed_nonce(PAYLOAD_KEY_BOX_NONCE_PREFIX, self.index)
    }
}

/// Header of a signcrypted message (mode 3).
#[derive(Debug, Clone)]
pub struct SigncryptedMessageHeader {
    ephemeral_public_key: BoxPublicKey,
    sender_secretbox: Vec<u8>,
    recipients: Vec<SigncryptedMessageRecipient>,
    encoded: EncodedHeader,
}

impl SigncryptedMessageHeader {
    /// Build the header for a new message. `sender` is `None` for an anonymous sender.
    pub fn create(
        sender: Option<&SigningPublicKey>,
        recipients: &[SigncryptRecipient],
        keys: &MessageKeys,
    ) -> SaltpackResult<Self> {
        if recipients.is_empty() {
            return Err(SaltpackError::format(
                "a signcrypted message needs at least one recipient",
            ));
        }

        let sender_bytes = sender.map_or([0u8; KEY_SIZE], |key| *key.as_bytes());
        let sender_secretbox = nacl::secretbox_seal(
            keys.payload_key.as_bytes(),
            SENDER_KEY_SECRETBOX_NONCE,
            &sender_bytes,
        )?;

        let recipients = recipients
            .iter()
            .zip(0u64..)
            .map(|(recipient, index)| {
                let shared = recipient.shared_key(&keys.ephemeral)?;
                let nonce = nacl::prefixed_nonce(PAYLOAD_KEY_BOX_NONCE_PREFIX, index);
                Ok(SigncryptedMessageRecipient {
                    identifier: recipient_identifier(&shared, &nonce)?,
                    payload_key_box: nacl::secretbox_seal(
                        shared.as_bytes(),
                        &nonce,
                        keys.payload_key.as_bytes(),
                    )?,
                    index,
                })
            })
            .collect::<SaltpackResult<Vec<_>>>()?;

        let ephemeral_public_key = keys.ephemeral.public_key();
        let encoded = encode_header(
            MessageMode::Signcryption,
            vec![
                Value::Binary(ephemeral_public_key.as_bytes().to_vec()),
                Value::Binary(sender_secretbox.clone()),
                Value::Array(
                    recipients
                        .iter()
                        .map(|r| {
                            Value::Array(vec![
                                Value::Binary(r.identifier.to_vec()),
                                Value::Binary(r.payload_key_box.clone()),
                            ])
                        })
                        .collect(),
                ),
            ],
        )?;

        tracing::debug!(
            recipients = recipients.len(),
            anonymous_sender = sender.is_none(),
            "signcryption header created"
        );

        Ok(Self {
            ephemeral_public_key,
            sender_secretbox,
            recipients,
            encoded,
        })
    }

    pub fn decode(bytes: &[u8], already_unwrapped: bool) -> SaltpackResult<Self> {
        let decoded = decode_outer(bytes, already_unwrapped)?;
        let items = &decoded.items;
        check_mode(items, &[MessageMode::Signcryption], 6)?;

        let ephemeral_public_key =
            BoxPublicKey::from_bytes(codec::bin_exact(&items[3], "ephemeral public key")?);
        let sender_secretbox =
            codec::bin_exact::<KEY_BOX_SIZE>(&items[4], "sender secretbox")?.to_vec();

        let recipients = codec::array(&items[5], "recipients")?
            .iter()
            .zip(0u64..)
            .map(|(entry, index)| {
                let fields = codec::array_exact(entry, 2, "recipient")?;
                Ok(SigncryptedMessageRecipient {
                    identifier: codec::bin_exact(&fields[0], "recipient identifier")?,
                    payload_key_box: codec::bin_exact::<KEY_BOX_SIZE>(
                        &fields[1],
                        "payload key box",
                    )?
                    .to_vec(),
                    index,
                })
            })
            .collect::<SaltpackResult<Vec<_>>>()?;

        tracing::debug!(recipients = recipients.len(), "signcryption header decoded");

        Ok(Self {
            ephemeral_public_key,
            sender_secretbox,
            recipients,
            encoded: decoded.encoded,
        })
    }

    pub fn ephemeral_public_key(&self) -> BoxPublicKey {
        self.ephemeral_public_key
    }

    pub fn sender_secretbox(&self) -> &[u8] {
        &self.sender_secretbox
    }

    pub fn recipients(&self) -> &[SigncryptedMessageRecipient] {
        &self.recipients
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

    /// Try every Curve25519 key against the recipient list, then every symmetric key.
    pub fn decrypt_payload_key(&self, keys: &[RecipientKey]) -> SaltpackResult<(PayloadKey, u64)> {
        let curve = keys
            .iter()
            .filter(|k| matches!(k, RecipientKey::Curve25519(_)));
        let symmetric = keys
            .iter()
            .filter(|k| matches!(k, RecipientKey::Symmetric { .. }));

        for key in curve.chain(symmetric) {
            if let Some((payload_key, index)) = key.attempt_decrypt(self)? {
                tracing::debug!(index, "payload key recovered");
                return Ok((payload_key, index));
            }
        }
        Err(SaltpackError::NotARecipient)
    }

    /// Open the sender secretbox. `None` means the sender is anonymous.
    pub fn decrypt_sender(
        &self,
        payload_key: &PayloadKey,
    ) -> SaltpackResult<Option<SigningPublicKey>> {
        let opened = nacl::secretbox_open(
            payload_key.as_bytes(),
            SENDER_KEY_SECRETBOX_NONCE,
            &self.sender_secretbox,
        )
        .ok_or_else(|| SaltpackError::authentication("sender secretbox failed to open"))?;

        let sender = SigningPublicKey::from_slice(&opened)
            .map_err(|_| SaltpackError::format("sender public key must be 32 bytes"))?;
        Ok((!sender.is_zero()).then_some(sender))
    }
}
