use thiserror::Error;

pub type SaltpackResult<T> = Result<T, SaltpackError>;

#[derive(Debug, Error)]
pub enum SaltpackError {
    #[error("format error: {0}")]
    Format(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("not a recipient of this message")]
    NotARecipient,

    #[error("truncation error: {0}")]
    Truncation(String),

    #[error("sender public key doesn't match the expected key")]
    SenderMismatch,

    #[error("stream already failed: {0}")]
    StreamFailed(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SaltpackError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn truncation(msg: impl Into<String>) -> Self {
        Self::Truncation(msg.into())
    }
}
