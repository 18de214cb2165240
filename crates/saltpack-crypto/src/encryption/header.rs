use rmpv::Value;
use saltpack_core::{MessageMode, SaltpackError, SaltpackResult};
use zeroize::Zeroize;

use crate::codec;
use crate::header::{check_mode, decode_outer, encode_header, EncodedHeader};
use crate::keys::{BoxKeyPair, BoxPublicKey, BoxSecretKey, MacKey, MessageKeys, PayloadKey};
use crate::nacl::{
    self, SharedBox, PAYLOAD_KEY_BOX_NONCE_PREFIX, SENDER_KEY_SECRETBOX_NONCE,
};
use crate::{KEY_SIZE, TAG_SIZE};

/// Size of a boxed 32-byte key
const KEY_BOX_SIZE: usize = KEY_SIZE + TAG_SIZE;

/// A recipient chosen by the sender.
///
/// An anonymous recipient's key is still used for key agreement but is written to the
/// header as `nil`, so recipients have to trial-decrypt to find their entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipient {
    public_key: BoxPublicKey,
    anonymous: bool,
}

impl Recipient {
    pub fn new(public_key: BoxPublicKey) -> Self {
        Self {
            public_key,
            anonymous: false,
        }
    }

    pub fn anonymous(public_key: BoxPublicKey) -> Self {
        Self {
            public_key,
            anonymous: true,
        }
    }

    pub fn public_key(&self) -> BoxPublicKey {
        self.public_key
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

impl From<BoxPublicKey> for Recipient {
    fn from(public_key: BoxPublicKey) -> Self {
        Self::new(public_key)
    }
}

/// One entry of the header's recipient list, as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMessageRecipient {
    public_key: Option<BoxPublicKey>,
    payload_key_box: Vec<u8>,
    index: u64,
}

impl EncryptedMessageRecipient {
    /// `None` for anonymous recipients
    pub fn public_key(&self) -> Option<BoxPublicKey> {
        self.public_key
    }

    pub fn payload_key_box(&self) -> &[u8] {
        &self.payload_key_box
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    fn to_value(&self) -> Value {
        Value::Array(vec![
            self.public_key
                .map_or(Value::Nil, |key| Value::Binary(key.as_bytes().to_vec())),
            Value::Binary(self.payload_key_box.clone()),
        ])
    }
}

/// Header of an encrypted message (mode 0).
#[derive(Debug, Clone)]
pub struct EncryptedMessageHeader {
    ephemeral_public_key: BoxPublicKey,
    sender_secretbox: Vec<u8>,
    recipients: Vec<EncryptedMessageRecipient>,
    encoded: EncodedHeader,
}

impl EncryptedMessageHeader {
    /// Build the header for a new message.
    ///
    /// Without a `sender` the ephemeral keypair stands in for it and the message is
    /// anonymous.
    pub fn create(
        sender: Option<&BoxKeyPair>,
        recipients: &[Recipient],
        keys: &MessageKeys,
    ) -> SaltpackResult<Self> {
        if recipients.is_empty() {
            return Err(SaltpackError::format(
                "an encrypted message needs at least one recipient",
            ));
        }

        let sender_public = sender.map_or(keys.ephemeral.public_key(), BoxKeyPair::public_key);
        let sender_secretbox = nacl::secretbox_seal(
            keys.payload_key.as_bytes(),
            SENDER_KEY_SECRETBOX_NONCE,
            sender_public.as_bytes(),
        )?;

        let recipients = recipients
            .iter()
            .zip(0u64..)
            .map(|(recipient, index)| {
                let nonce = nacl::prefixed_nonce(PAYLOAD_KEY_BOX_NONCE_PREFIX, index);
                let payload_key_box =
                    SharedBox::new(&recipient.public_key, keys.ephemeral.secret_key())
                        .seal(&nonce, keys.payload_key.as_bytes())?;
                Ok(EncryptedMessageRecipient {
                    public_key: (!recipient.anonymous).then_some(recipient.public_key),
                    payload_key_box,
                    index,
                })
            })
            .collect::<SaltpackResult<Vec<_>>>()?;

        let ephemeral_public_key = keys.ephemeral.public_key();
        let encoded = encode_header(
            MessageMode::Encryption,
            vec![
                Value::Binary(ephemeral_public_key.as_bytes().to_vec()),
                Value::Binary(sender_secretbox.clone()),
                Value::Array(recipients.iter().map(EncryptedMessageRecipient::to_value).collect()),
            ],
        )?;

        tracing::debug!(
            recipients = recipients.len(),
            anonymous_sender = sender.is_none(),
            "encryption header created"
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
        check_mode(items, &[MessageMode::Encryption], 6)?;

        let ephemeral_public_key =
            BoxPublicKey::from_bytes(codec::bin_exact(&items[3], "ephemeral public key")?);
        let sender_secretbox =
            codec::bin_exact::<KEY_BOX_SIZE>(&items[4], "sender secretbox")?.to_vec();

        let recipients = codec::array(&items[5], "recipients")?
            .iter()
            .zip(0u64..)
            .map(|(entry, index)| {
                let fields = codec::array_exact(entry, 2, "recipient")?;
                let public_key = match &fields[0] {
                    Value::Nil => None,
                    key => Some(BoxPublicKey::from_bytes(codec::bin_exact(
                        key,
                        "recipient public key",
                    )?)),
                };
                let payload_key_box =
                    codec::bin_exact::<KEY_BOX_SIZE>(&fields[1], "payload key box")?.to_vec();
                Ok(EncryptedMessageRecipient {
                    public_key,
                    payload_key_box,
                    index,
                })
            })
            .collect::<SaltpackResult<Vec<_>>>()?;

        tracing::debug!(recipients = recipients.len(), "encryption header decoded");

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

    pub fn recipients(&self) -> &[EncryptedMessageRecipient] {
        &self.recipients
    }

    pub fn header_hash(&self) -> &[u8; 64] {
        self.encoded.hash()
    }

    /// The header as written to the wire
    pub fn encoded(&self) -> &[u8] {
        self.encoded.encoded()
    }

    pub(crate) fn encoded_header(&self) -> &EncodedHeader {
        &self.encoded
    }

    /// Find and open this keypair's payload key box.
    ///
    /// Entries naming a different public key are skipped; anonymous entries are tried
    /// in order. Returns the payload key and the recipient index.
    pub fn decrypt_payload_key(&self, keypair: &BoxKeyPair) -> SaltpackResult<(PayloadKey, u64)> {
        let shared = SharedBox::new(&self.ephemeral_public_key, keypair.secret_key());
        let ours = keypair.public_key();

        for recipient in &self.recipients {
            if recipient.public_key.is_some_and(|key| key != ours) {
                continue;
            }

            let nonce = nacl::prefixed_nonce(PAYLOAD_KEY_BOX_NONCE_PREFIX, recipient.index);
            if let Some(mut opened) = shared.open(&nonce, &recipient.payload_key_box) {
                let key = PayloadKey::from_slice(&opened);
                opened.zeroize();
                if let Ok(key) = key {
                    tracing::debug!(index = recipient.index, "payload key recovered");
                    return Ok((key, recipient.index));
                }
            }
        }

        Err(SaltpackError::NotARecipient)
    }

    /// Open the sender secretbox.
    pub fn decrypt_sender(&self, payload_key: &PayloadKey) -> SaltpackResult<BoxPublicKey> {
        let opened = nacl::secretbox_open(
            payload_key.as_bytes(),
            SENDER_KEY_SECRETBOX_NONCE,
            &self.sender_secretbox,
        )
        .ok_or_else(|| SaltpackError::authentication("sender secretbox failed to open"))?;

        BoxPublicKey::from_slice(&opened)
            .map_err(|_| SaltpackError::format("sender public key must be 32 bytes"))
    }

    /// The authenticator keys for every recipient, in header order.
    pub(crate) fn sender_mac_keys(
        &self,
        sender: &BoxSecretKey,
        ephemeral: &BoxSecretKey,
        recipients: &[Recipient],
    ) -> SaltpackResult<Vec<MacKey>> {
        recipients
            .iter()
            .zip(&self.recipients)
            .map(|(recipient, entry)| {
                mac_key(
                    self.header_hash(),
                    entry.index,
                    &SharedBox::new(&recipient.public_key, sender),
                    &SharedBox::new(&recipient.public_key, ephemeral),
                )
            })
            .collect()
    }

    /// The authenticator key for the recipient at `index`.
    pub(crate) fn recipient_mac_key(
        &self,
        index: u64,
        keypair: &BoxKeyPair,
        sender: &BoxPublicKey,
    ) -> SaltpackResult<MacKey> {
        mac_key(
            self.header_hash(),
            index,
            &SharedBox::new(sender, keypair.secret_key()),
            &SharedBox::new(&self.ephemeral_public_key, keypair.secret_key()),
        )
    }
}

/// `SHA512(box_sender(0^32)[-32:] || box_ephemeral(0^32)[-32:])[..32]`
///
/// Both boxes use `header_hash[..16] || be64(index)` as the nonce, with the low bit of
/// byte 15 cleared for the sender box and set for the ephemeral box.
fn mac_key(
    header_hash: &[u8; 64],
    index: u64,
    sender_box: &SharedBox,
    ephemeral_box: &SharedBox,
) -> SaltpackResult<MacKey> {
    let mut prefix = [0u8; 16];
    prefix.copy_from_slice(&header_hash[..16]);

    prefix[15] &= 0xfe;
    let sender_part = sender_box.seal(&nacl::prefixed_nonce(&prefix, index), &[0u8; KEY_SIZE])?;
    prefix[15] |= 0x01;
    let ephemeral_part =
        ephemeral_box.seal(&nacl::prefixed_nonce(&prefix, index), &[0u8; KEY_SIZE])?;

    let digest = nacl::sha512(&[&sender_part[TAG_SIZE..], &ephemeral_part[TAG_SIZE..]]);
    MacKey::from_slice(&digest[..KEY_SIZE])
}
