use rmpv::Value;
use saltpack_core::{SaltpackError, SaltpackResult, Transform};

use super::header::SigncryptedMessageHeader;
use super::recipient::{RecipientKey, SigncryptRecipient};
use super::ENCRYPTED_SIGNATURE_PREFIX;
use crate::codec;
use crate::header::EncodedHeader;
use crate::keys::{MessageKeys, PayloadKey, SigningKeyPair, SigningPublicKey};
use crate::nacl::{self, NonceBytes};
use crate::packet::{MessageOpener, OpenedPacket, PacketReader, PacketSealer, PacketWriter};
use crate::SIGNATURE_SIZE;

/// `header_hash[..16]` with the final flag in the low bit of byte 15, then `be64(index)`
fn packet_nonce(header_hash: &[u8; 64], index: u64, is_final: bool) -> NonceBytes {
    let mut prefix = [0u8; 16];
    prefix.copy_from_slice(&header_hash[..16]);
    prefix[15] = (prefix[15] & 0xfe) | u8::from(is_final);
    nacl::prefixed_nonce(&prefix, index)
}

/// `prefix || header_hash || nonce || final || SHA512(chunk)`
fn signature_input(
    header_hash: &[u8; 64],
    nonce: &NonceBytes,
    is_final: bool,
    chunk: &[u8],
) -> Vec<u8> {
    let chunk_hash = nacl::sha512(&[chunk]);
    [
        ENCRYPTED_SIGNATURE_PREFIX,
        &header_hash[..],
        &nonce[..],
        &[u8::from(is_final)],
        &chunk_hash[..],
    ]
    .concat()
}

#[derive(Debug)]
pub(crate) struct SigncryptionSealer {
    header: SigncryptedMessageHeader,
    payload_key: PayloadKey,
    sender: Option<SigningKeyPair>,
}

impl PacketSealer for SigncryptionSealer {
    fn header(&self) -> &EncodedHeader {
        self.header.encoded_header()
    }

    fn seal_packet(
        &mut self,
        index: u64,
        chunk: &[u8],
        is_final: bool,
    ) -> SaltpackResult<Vec<u8>> {
        let hash = self.header.header_hash();
        let nonce = packet_nonce(hash, index, is_final);
        let signature = match &self.sender {
            Some(sender) => sender.sign(&signature_input(hash, &nonce, is_final, chunk)),
            None => [0u8; SIGNATURE_SIZE],
        };

        let mut plaintext = Vec::with_capacity(SIGNATURE_SIZE + chunk.len());
        plaintext.extend_from_slice(&signature);
        plaintext.extend_from_slice(chunk);
        let payload_secretbox = nacl::secretbox_seal(self.payload_key.as_bytes(), &nonce, &plaintext)?;

        codec::encode(&Value::Array(vec![
            Value::Binary(payload_secretbox),
            Value::Boolean(is_final),
        ]))
    }
}

/// Streaming signcryption.
#[derive(Debug)]
pub struct SigncryptStream {
    writer: PacketWriter<SigncryptionSealer>,
}

impl SigncryptStream {
    /// Signcrypt from `sender` (anonymously when `None`) to `recipients`.
    pub fn new(
        sender: Option<&SigningKeyPair>,
        recipients: &[SigncryptRecipient],
    ) -> SaltpackResult<Self> {
        Self::with_keys(sender, recipients, MessageKeys::generate())
    }

    pub fn with_keys(
        sender: Option<&SigningKeyPair>,
        recipients: &[SigncryptRecipient],
        keys: MessageKeys,
    ) -> SaltpackResult<Self> {
        let sender_public = sender.map(SigningKeyPair::public_key);
        let header = SigncryptedMessageHeader::create(sender_public.as_ref(), recipients, &keys)?;
        Ok(Self {
            writer: PacketWriter::new(SigncryptionSealer {
                header,
                payload_key: keys.payload_key,
                sender: sender.cloned(),
            }),
        })
    }

    pub fn header(&self) -> &SigncryptedMessageHeader {
        &self.writer.sealer().header
    }
}

impl Transform for SigncryptStream {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.writer.update(input)
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.writer.finish()
    }
}

pub(crate) struct DesigncryptionOpener {
    keys: Vec<RecipientKey>,
    expected_sender: Option<SigningPublicKey>,
}

pub(crate) struct DesigncryptionSession {
    header: SigncryptedMessageHeader,
    payload_key: PayloadKey,
    sender: Option<SigningPublicKey>,
}

impl MessageOpener for DesigncryptionOpener {
    type Session = DesigncryptionSession;

    fn open_header(&mut self, bytes: &[u8]) -> SaltpackResult<DesigncryptionSession> {
        let header = SigncryptedMessageHeader::decode(bytes, false)?;
        let (payload_key, _) = header.decrypt_payload_key(&self.keys)?;
        let sender = header.decrypt_sender(&payload_key)?;

        if self.expected_sender.is_some() && sender != self.expected_sender {
            tracing::warn!(
                anonymous = sender.is_none(),
                "signcrypted message is from an unexpected sender"
            );
            return Err(SaltpackError::SenderMismatch);
        }
        if let Some(sender) = &sender {
            sender.verifying_key()?;
        }

        Ok(DesigncryptionSession {
            header,
            payload_key,
            sender,
        })
    }

    fn open_packet(
        &mut self,
        session: &DesigncryptionSession,
        index: u64,
        packet: &[u8],
    ) -> SaltpackResult<OpenedPacket> {
        let value = codec::decode(packet)?;
        let items = codec::array_exact(&value, 2, "signcrypted payload packet")?;
        let payload_secretbox = codec::bin(&items[0], "payload secretbox")?;
        let is_final = codec::boolean(&items[1], "final flag")?;

        let hash = session.header.header_hash();
        let nonce = packet_nonce(hash, index, is_final);
        let mut plaintext =
            nacl::secretbox_open(session.payload_key.as_bytes(), &nonce, payload_secretbox)
                .ok_or_else(|| {
                    SaltpackError::Authentication(format!(
                        "payload secretbox {index} failed to open"
                    ))
                })?;
        if plaintext.len() < SIGNATURE_SIZE {
            return Err(SaltpackError::Format(format!(
                "packet {index} is too short to hold a signature"
            )));
        }

        let data = plaintext.split_off(SIGNATURE_SIZE);
        if let Some(sender) = &session.sender {
            let mut signature = [0u8; SIGNATURE_SIZE];
            signature.copy_from_slice(&plaintext);
            sender
                .verify(&signature_input(hash, &nonce, is_final, &data), &signature)
                .map_err(|_| {
                    SaltpackError::Authentication(format!("invalid signature on packet {index}"))
                })?;
        }

        Ok(OpenedPacket { data, is_final })
    }
}

/// Streaming designcryption.
pub struct DesigncryptStream {
    reader: PacketReader<DesigncryptionOpener>,
}

impl DesigncryptStream {
    /// Open with any of `keys`, optionally requiring a particular sender.
    pub fn new(keys: &[RecipientKey], expected_sender: Option<&SigningPublicKey>) -> Self {
        Self {
            reader: PacketReader::new(DesigncryptionOpener {
                keys: keys.to_vec(),
                expected_sender: expected_sender.copied(),
            }),
        }
    }

    pub fn header(&self) -> Option<&SigncryptedMessageHeader> {
        self.reader.session().map(|s| &s.header)
    }

    /// `None` until the header is read, and for anonymous senders
    pub fn sender_public_key(&self) -> Option<SigningPublicKey> {
        self.reader.session().and_then(|s| s.sender)
    }

    /// `None` until the header is read
    pub fn is_anonymous_sender(&self) -> Option<bool> {
        self.reader.session().map(|s| s.sender.is_none())
    }
}

impl Transform for DesigncryptStream {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.reader.update(input)
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.reader.finish()
    }
}

impl std::fmt::Debug for DesigncryptStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesigncryptStream")
            .field("sender", &self.sender_public_key())
            .finish_non_exhaustive()
    }
}
