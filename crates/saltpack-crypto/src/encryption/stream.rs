use rmpv::Value;
use saltpack_core::{SaltpackError, SaltpackResult, Transform};
use subtle::ConstantTimeEq;

use super::header::{EncryptedMessageHeader, Recipient};
use crate::codec;
use crate::header::EncodedHeader;
use crate::keys::{BoxKeyPair, BoxPublicKey, MacKey, MessageKeys, PayloadKey};
use crate::nacl::{self, NonceBytes, PAYLOAD_NONCE_PREFIX};
use crate::packet::{MessageOpener, OpenedPacket, PacketReader, PacketSealer, PacketWriter};

/// `SHA512(header_hash || nonce || final || payload_secretbox)`
fn authenticator_hash(
    header_hash: &[u8; 64],
    nonce: &NonceBytes,
    is_final: bool,
    payload_secretbox: &[u8],
) -> [u8; 64] {
    nacl::sha512(&[header_hash, nonce, &[u8::from(is_final)], payload_secretbox])
}

#[derive(Debug)]
pub(crate) struct EncryptionSealer {
    header: EncryptedMessageHeader,
    payload_key: PayloadKey,
    mac_keys: Vec<MacKey>,
}

impl EncryptionSealer {
    fn new(
        sender: Option<&BoxKeyPair>,
        recipients: &[Recipient],
        keys: MessageKeys,
    ) -> SaltpackResult<Self> {
        let header = EncryptedMessageHeader::create(sender, recipients, &keys)?;
        let sender_secret = sender.map_or(keys.ephemeral.secret_key(), BoxKeyPair::secret_key);
        let mac_keys =
            header.sender_mac_keys(sender_secret, keys.ephemeral.secret_key(), recipients)?;

        Ok(Self {
            header,
            payload_key: keys.payload_key,
            mac_keys,
        })
    }
}

impl PacketSealer for EncryptionSealer {
    fn header(&self) -> &EncodedHeader {
        self.header.encoded_header()
    }

    fn seal_packet(
        &mut self,
        index: u64,
        chunk: &[u8],
        is_final: bool,
    ) -> SaltpackResult<Vec<u8>> {
        let nonce = nacl::prefixed_nonce(PAYLOAD_NONCE_PREFIX, index);
        let payload_secretbox = nacl::secretbox_seal(self.payload_key.as_bytes(), &nonce, chunk)?;
        let hash = authenticator_hash(self.header.header_hash(), &nonce, is_final, &payload_secretbox);

        let authenticators = self
            .mac_keys
            .iter()
            .map(|key| {
                nacl::hmac_sha512_32(key.as_bytes(), &[&hash])
                    .map(|auth| Value::Binary(auth.to_vec()))
            })
            .collect::<SaltpackResult<Vec<_>>>()?;

        codec::encode(&Value::Array(vec![
            Value::Boolean(is_final),
            Value::Array(authenticators),
            Value::Binary(payload_secretbox),
        ]))
    }
}

/// Streaming encryption.
///
/// The first output carries the header; payload packets follow as each 1 MiB chunk
/// fills up.
#[derive(Debug)]
pub struct EncryptStream {
    writer: PacketWriter<EncryptionSealer>,
}

impl EncryptStream {
    /// Encrypt from `sender` (anonymously when `None`) to `recipients`.
    pub fn new(sender: Option<&BoxKeyPair>, recipients: &[Recipient]) -> SaltpackResult<Self> {
        Self::with_keys(sender, recipients, MessageKeys::generate())
    }

    /// Like [`EncryptStream::new`] with a caller-chosen payload key and ephemeral keypair.
    pub fn with_keys(
        sender: Option<&BoxKeyPair>,
        recipients: &[Recipient],
        keys: MessageKeys,
    ) -> SaltpackResult<Self> {
        Ok(Self {
            writer: PacketWriter::new(EncryptionSealer::new(sender, recipients, keys)?),
        })
    }

    pub fn header(&self) -> &EncryptedMessageHeader {
        &self.writer.sealer().header
    }
}

impl Transform for EncryptStream {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.writer.update(input)
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.writer.finish()
    }
}

pub(crate) struct DecryptionOpener {
    keypair: BoxKeyPair,
    expected_sender: Option<BoxPublicKey>,
}

pub(crate) struct DecryptionSession {
    header: EncryptedMessageHeader,
    payload_key: PayloadKey,
    mac_key: MacKey,
    recipient_index: u64,
    sender: BoxPublicKey,
}

impl MessageOpener for DecryptionOpener {
    type Session = DecryptionSession;

    fn open_header(&mut self, bytes: &[u8]) -> SaltpackResult<DecryptionSession> {
        let header = EncryptedMessageHeader::decode(bytes, false)?;
        let (payload_key, recipient_index) = header.decrypt_payload_key(&self.keypair)?;
        let sender = header.decrypt_sender(&payload_key)?;

        if self.expected_sender.is_some_and(|expected| expected != sender) {
            tracing::warn!("encrypted message is from an unexpected sender");
            return Err(SaltpackError::SenderMismatch);
        }

        let mac_key = header.recipient_mac_key(recipient_index, &self.keypair, &sender)?;
        Ok(DecryptionSession {
            header,
            payload_key,
            mac_key,
            recipient_index,
            sender,
        })
    }

    fn open_packet(
        &mut self,
        session: &DecryptionSession,
        index: u64,
        packet: &[u8],
    ) -> SaltpackResult<OpenedPacket> {
        let value = codec::decode(packet)?;
        let items = codec::array_exact(&value, 3, "encryption payload packet")?;
        let is_final = codec::boolean(&items[0], "final flag")?;
        let authenticators = codec::array(&items[1], "authenticators")?;
        let payload_secretbox = codec::bin(&items[2], "payload secretbox")?;

        let authenticator = usize::try_from(session.recipient_index)
            .ok()
            .and_then(|i| authenticators.get(i))
            .ok_or_else(|| SaltpackError::format("packet has no authenticator for this recipient"))?;
        let authenticator = codec::bin_exact::<32>(authenticator, "authenticator")?;

        let nonce = nacl::prefixed_nonce(PAYLOAD_NONCE_PREFIX, index);
        let hash = authenticator_hash(
            session.header.header_hash(),
            &nonce,
            is_final,
            payload_secretbox,
        );
        let expected = nacl::hmac_sha512_32(session.mac_key.as_bytes(), &[&hash])?;
        if !bool::from(expected[..].ct_eq(&authenticator[..])) {
            return Err(SaltpackError::Authentication(format!(
                "invalid authenticator for packet {index}"
            )));
        }

        let data = nacl::secretbox_open(session.payload_key.as_bytes(), &nonce, payload_secretbox)
            .ok_or_else(|| {
                SaltpackError::Authentication(format!("payload secretbox {index} failed to open"))
            })?;
        Ok(OpenedPacket { data, is_final })
    }
}

/// Streaming decryption.
///
/// Each packet is authenticated as soon as it is complete; its plaintext is released
/// once the next packet (or the end of input) shows whether it was really the last.
pub struct DecryptStream {
    reader: PacketReader<DecryptionOpener>,
}

impl DecryptStream {
    /// Decrypt with `keypair`, optionally requiring a particular sender.
    pub fn new(keypair: &BoxKeyPair, expected_sender: Option<&BoxPublicKey>) -> Self {
        Self {
            reader: PacketReader::new(DecryptionOpener {
                keypair: keypair.clone(),
                expected_sender: expected_sender.copied(),
            }),
        }
    }

    /// The decoded header, once it has been read
    pub fn header(&self) -> Option<&EncryptedMessageHeader> {
        self.reader.session().map(|s| &s.header)
    }

    /// The sender's public key; the ephemeral key for anonymous messages
    pub fn sender_public_key(&self) -> Option<BoxPublicKey> {
        self.reader.session().map(|s| s.sender)
    }

    /// Whether the sender chose to stay anonymous
    pub fn is_anonymous_sender(&self) -> Option<bool> {
        self.reader
            .session()
            .map(|s| s.sender == s.header.ephemeral_public_key())
    }
}

impl Transform for DecryptStream {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.reader.update(input)
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.reader.finish()
    }
}

impl std::fmt::Debug for DecryptStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptStream")
            .field("sender", &self.sender_public_key())
            .finish_non_exhaustive()
    }
}
