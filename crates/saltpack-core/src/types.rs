use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SaltpackError, SaltpackResult};

/// The `mode` field of a saltpack header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageMode {
    Encryption,
    AttachedSigning,
    DetachedSigning,
    Signcryption,
}

impl MessageMode {
    pub fn as_u64(self) -> u64 {
        match self {
            MessageMode::Encryption => 0,
            MessageMode::AttachedSigning => 1,
            MessageMode::DetachedSigning => 2,
            MessageMode::Signcryption => 3,
        }
    }

    pub fn from_u64(mode: u64) -> SaltpackResult<Self> {
        match mode {
            0 => Ok(MessageMode::Encryption),
            1 => Ok(MessageMode::AttachedSigning),
            2 => Ok(MessageMode::DetachedSigning),
            3 => Ok(MessageMode::Signcryption),
            other => Err(SaltpackError::Format(format!("unknown message mode {other}"))),
        }
    }

    /// Armor message type used when this mode is armored
    pub fn armor_type(self) -> MessageType {
        match self {
            MessageMode::Encryption | MessageMode::Signcryption => MessageType::EncryptedMessage,
            MessageMode::AttachedSigning => MessageType::SignedMessage,
            MessageMode::DetachedSigning => MessageType::DetachedSignature,
        }
    }
}

/// Message type named in an armor header and footer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MessageType {
    EncryptedMessage,
    SignedMessage,
    DetachedSignature,
    /// Legacy untyped armor ("BEGIN SALTPACK MESSAGE.")
    #[default]
    Message,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::EncryptedMessage => "ENCRYPTED MESSAGE",
            MessageType::SignedMessage => "SIGNED MESSAGE",
            MessageType::DetachedSignature => "DETACHED SIGNATURE",
            MessageType::Message => "MESSAGE",
        }
    }

    /// Parse a type as it appears in armor framing. Words may be separated by any run of
    /// `>`, `\n`, `\r`, `\t` or space.
    pub fn parse(text: &str) -> SaltpackResult<Self> {
        let words: Vec<&str> = text
            .split(|c: char| matches!(c, '>' | '\n' | '\r' | '\t' | ' '))
            .filter(|w| !w.is_empty())
            .collect();

        match words.as_slice() {
            ["ENCRYPTED", "MESSAGE"] => Ok(MessageType::EncryptedMessage),
            ["SIGNED", "MESSAGE"] => Ok(MessageType::SignedMessage),
            ["DETACHED", "SIGNATURE"] => Ok(MessageType::DetachedSignature),
            ["MESSAGE"] => Ok(MessageType::Message),
            _ => Err(SaltpackError::Format(format!(
                "unknown armor message type {text:?}"
            ))),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
