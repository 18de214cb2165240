use rmpv::Value;
use saltpack_core::{SaltpackError, SaltpackResult, Transform};

use super::header::{random_nonce, SignedMessageHeader, SIGNING_NONCE_SIZE};
use super::ATTACHED_SIGNATURE_PREFIX;
use crate::codec;
use crate::header::EncodedHeader;
use crate::keys::{SigningKeyPair, SigningPublicKey};
use crate::nacl;
use crate::packet::{MessageOpener, OpenedPacket, PacketReader, PacketSealer, PacketWriter};
use crate::SIGNATURE_SIZE;

/// `prefix || SHA512(header_hash || be64(index) || final || chunk)`
fn attached_signature_input(
    header_hash: &[u8; 64],
    index: u64,
    is_final: bool,
    chunk: &[u8],
) -> Vec<u8> {
    let digest = nacl::sha512(&[
        header_hash,
        &index.to_be_bytes(),
        &[u8::from(is_final)],
        chunk,
    ]);
    [ATTACHED_SIGNATURE_PREFIX, &digest[..]].concat()
}

#[derive(Debug)]
pub(crate) struct SigningSealer {
    header: SignedMessageHeader,
    keypair: SigningKeyPair,
}

impl PacketSealer for SigningSealer {
    fn header(&self) -> &EncodedHeader {
        self.header.encoded_header()
    }

    fn seal_packet(
        &mut self,
        index: u64,
        chunk: &[u8],
        is_final: bool,
    ) -> SaltpackResult<Vec<u8>> {
        let input = attached_signature_input(self.header.header_hash(), index, is_final, chunk);
        let signature = self.keypair.sign(&input);
        codec::encode(&Value::Array(vec![
            Value::Boolean(is_final),
            Value::Binary(signature.to_vec()),
            Value::Binary(chunk.to_vec()),
        ]))
    }
}

/// Streaming attached signing.
#[derive(Debug)]
pub struct SignStream {
    writer: PacketWriter<SigningSealer>,
}

impl SignStream {
    pub fn new(keypair: &SigningKeyPair) -> SaltpackResult<Self> {
        Self::with_nonce(keypair, random_nonce())
    }

    /// Sign with a caller-chosen header nonce.
    pub fn with_nonce(
        keypair: &SigningKeyPair,
        nonce: [u8; SIGNING_NONCE_SIZE],
    ) -> SaltpackResult<Self> {
        let header = SignedMessageHeader::create(keypair.public_key(), nonce, true)?;
        Ok(Self {
            writer: PacketWriter::new(SigningSealer {
                header,
                keypair: keypair.clone(),
            }),
        })
    }

    pub fn header(&self) -> &SignedMessageHeader {
        &self.writer.sealer().header
    }
}

impl Transform for SignStream {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.writer.update(input)
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.writer.finish()
    }
}

pub(crate) struct VerifyingOpener {
    expected: Option<SigningPublicKey>,
}

pub(crate) struct VerificationSession {
    header: SignedMessageHeader,
    public_key: SigningPublicKey,
}

impl MessageOpener for VerifyingOpener {
    type Session = VerificationSession;

    fn open_header(&mut self, bytes: &[u8]) -> SaltpackResult<VerificationSession> {
        let header = SignedMessageHeader::decode(bytes, false)?;
        if !header.is_attached() {
            return Err(SaltpackError::format(
                "expected an attached signature, found a detached one",
            ));
        }

        let public_key = self.expected.unwrap_or(header.public_key());
        // Reject unusable keys before any packet arrives
        public_key.verifying_key()?;
        Ok(VerificationSession { header, public_key })
    }

    fn open_packet(
        &mut self,
        session: &VerificationSession,
        index: u64,
        packet: &[u8],
    ) -> SaltpackResult<OpenedPacket> {
        let value = codec::decode(packet)?;
        let items = codec::array_exact(&value, 3, "signed payload packet")?;
        let is_final = codec::boolean(&items[0], "final flag")?;
        let signature = codec::bin_exact::<SIGNATURE_SIZE>(&items[1], "signature")?;
        let chunk = codec::bin(&items[2], "payload chunk")?;

        let input = attached_signature_input(session.header.header_hash(), index, is_final, chunk);
        session
            .public_key
            .verify(&input, &signature)
            .map_err(|_| SaltpackError::Authentication(format!("invalid signature on packet {index}")))?;

        Ok(OpenedPacket {
            data: chunk.to_vec(),
            is_final,
        })
    }
}

/// Streaming verification of an attached signature.
pub struct VerifyStream {
    reader: PacketReader<VerifyingOpener>,
}

impl VerifyStream {
    /// Verify against `expected` if given, else against the key in the header.
    pub fn new(expected: Option<&SigningPublicKey>) -> Self {
        Self {
            reader: PacketReader::new(VerifyingOpener {
                expected: expected.copied(),
            }),
        }
    }

    pub fn header(&self) -> Option<&SignedMessageHeader> {
        self.reader.session().map(|s| &s.header)
    }

    /// The key signatures are checked against, once the header has been read
    pub fn public_key(&self) -> Option<SigningPublicKey> {
        self.reader.session().map(|s| s.public_key)
    }
}

impl Transform for VerifyStream {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.reader.update(input)
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.reader.finish()
    }
}

impl std::fmt::Debug for VerifyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyStream")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
