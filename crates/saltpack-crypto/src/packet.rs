//! Payload packet framing shared by the attached modes
//!
//! Writers buffer plaintext and seal one packet per full chunk. A chunk is only sealed
//! once more input follows it, so `finish` always has exactly one final packet to
//! emit. That packet is empty only when the whole input was empty.
//!
//! Readers open each packet as soon as it is complete but hold its plaintext back until
//! the next packet arrives or the input ends:
//!
//! ```text
//! AwaitingHeader ──header──▶ AwaitingPacket { held } ──finish──▶ Done
//!                                 │  ▲
//!                                 └──┘ packet: release held (must be non-final)
//! ```

use saltpack_core::{SaltpackError, SaltpackResult, StreamGuard};

use crate::codec::ObjectDecoder;
use crate::header::EncodedHeader;
use crate::CHUNK_SIZE;

/// Seals the packets of one outgoing message.
pub trait PacketSealer {
    fn header(&self) -> &EncodedHeader;

    fn seal_packet(&mut self, index: u64, chunk: &[u8], is_final: bool)
        -> SaltpackResult<Vec<u8>>;
}

#[derive(Debug)]
pub struct PacketWriter<S> {
    sealer: S,
    buffer: Vec<u8>,
    index: u64,
    header_sent: bool,
    guard: StreamGuard,
}

impl<S: PacketSealer> PacketWriter<S> {
    pub fn new(sealer: S) -> Self {
        Self {
            sealer,
            buffer: Vec::new(),
            index: 0,
            header_sent: false,
            guard: StreamGuard::default(),
        }
    }

    pub fn sealer(&self) -> &S {
        &self.sealer
    }

    pub fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.guard.check()?;
        let result = self.write(input);
        self.guard.record(result)
    }

    pub fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.guard.check()?;
        let result = self.close();
        let out = self.guard.record(result)?;
        self.guard.mark_finished();
        Ok(out)
    }

    fn take_header(&mut self, out: &mut Vec<u8>) {
        if !self.header_sent {
            out.extend_from_slice(self.sealer.header().encoded());
            self.header_sent = true;
        }
    }

    fn write(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        let mut out = Vec::new();
        self.take_header(&mut out);
        self.buffer.extend_from_slice(input);

        while self.buffer.len() > CHUNK_SIZE {
            let chunk: Vec<u8> = self.buffer.drain(..CHUNK_SIZE).collect();
            out.extend(self.sealer.seal_packet(self.index, &chunk, false)?);
            self.index += 1;
        }
        Ok(out)
    }

    fn close(&mut self) -> SaltpackResult<Vec<u8>> {
        let mut out = Vec::new();
        self.take_header(&mut out);
        let chunk = std::mem::take(&mut self.buffer);
        out.extend(self.sealer.seal_packet(self.index, &chunk, true)?);
        tracing::debug!(packets = self.index + 1, "message sealed");
        Ok(out)
    }
}

/// An authenticated packet whose plaintext has not been released yet
#[derive(Debug)]
pub struct OpenedPacket {
    pub data: Vec<u8>,
    pub is_final: bool,
}

/// Opens the header and packets of one incoming message.
pub trait MessageOpener {
    /// Per-message state established by the header (keys, hash, sender)
    type Session;

    /// `header` is the complete outer `bin` object.
    fn open_header(&mut self, header: &[u8]) -> SaltpackResult<Self::Session>;

    /// Authenticate and decrypt one packet. Must fail rather than return unverified data.
    fn open_packet(
        &mut self,
        session: &Self::Session,
        index: u64,
        packet: &[u8],
    ) -> SaltpackResult<OpenedPacket>;
}

enum DecodeState<S> {
    AwaitingHeader,
    AwaitingPacket {
        session: S,
        index: u64,
        held: Option<OpenedPacket>,
    },
    Done {
        session: S,
    },
}

pub struct PacketReader<O: MessageOpener> {
    opener: O,
    decoder: ObjectDecoder,
    state: DecodeState<O::Session>,
    guard: StreamGuard,
}

impl<O: MessageOpener> PacketReader<O> {
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            decoder: ObjectDecoder::new(),
            state: DecodeState::AwaitingHeader,
            guard: StreamGuard::default(),
        }
    }

    /// Available once the header has been read and accepted
    pub fn session(&self) -> Option<&O::Session> {
        match &self.state {
            DecodeState::AwaitingHeader => None,
            DecodeState::AwaitingPacket { session, .. } | DecodeState::Done { session } => {
                Some(session)
            }
        }
    }

    pub fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.guard.check()?;
        let result = self.read(input);
        self.guard.record(result)
    }

    pub fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.guard.check()?;
        let result = self.close();
        let out = self.guard.record(result)?;
        self.guard.mark_finished();
        Ok(out)
    }

    fn read(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.decoder.push(input);
        let mut out = Vec::new();
        while let Some(object) = self.decoder.next_object()? {
            self.accept(&object, &mut out)?;
        }
        Ok(out)
    }

    fn accept(&mut self, object: &[u8], out: &mut Vec<u8>) -> SaltpackResult<()> {
        match &mut self.state {
            DecodeState::AwaitingHeader => {
                let session = self.opener.open_header(object)?;
                self.state = DecodeState::AwaitingPacket {
                    session,
                    index: 0,
                    held: None,
                };
            }
            DecodeState::AwaitingPacket {
                session,
                index,
                held,
            } => {
                if let Some(previous) = held.take() {
                    if previous.is_final {
                        return Err(SaltpackError::truncation("data after the final packet"));
                    }
                    out.extend(previous.data);
                }

                let packet = self.opener.open_packet(session, *index, object)?;
                tracing::debug!(index = *index, is_final = packet.is_final, "packet opened");
                *index += 1;
                *held = Some(packet);
            }
            DecodeState::Done { .. } => {
                return Err(SaltpackError::truncation("data after the final packet"));
            }
        }
        Ok(())
    }

    fn close(&mut self) -> SaltpackResult<Vec<u8>> {
        if self.decoder.remaining() > 0 {
            return Err(SaltpackError::Truncation(format!(
                "input ended inside a msgpack object ({} bytes left over)",
                self.decoder.remaining()
            )));
        }

        match std::mem::replace(&mut self.state, DecodeState::AwaitingHeader) {
            DecodeState::AwaitingHeader => Err(SaltpackError::truncation("message has no header")),
            DecodeState::AwaitingPacket { held: None, .. } => {
                Err(SaltpackError::truncation("message has no payload packets"))
            }
            DecodeState::AwaitingPacket {
                session,
                held: Some(last),
                ..
            } => {
                if !last.is_final {
                    return Err(SaltpackError::truncation("last packet is not marked final"));
                }
                self.state = DecodeState::Done { session };
                Ok(last.data)
            }
            DecodeState::Done { session } => {
                self.state = DecodeState::Done { session };
                Ok(Vec::new())
            }
        }
    }
}
