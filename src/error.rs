//! Client fault taxonomy.
//!
//! Every failure the protocol layer can hit carries a stable category so the
//! gateway client can fold it into a fail reply without losing which stage
//! broke.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// A required channel credential or address value is missing or empty.
    #[error("configuration: {0}")]
    Configuration(String),
    /// Transport-level connect failed before any exchange.
    #[error("connection: {0}")]
    Connection(String),
    /// Signature computation failed or the key material is invalid.
    #[error("signing: {0}")]
    Signing(String),
    /// I/O failure while writing the request frame.
    #[error("send: {0}")]
    Send(String),
    /// I/O failure while reading the reply frame.
    #[error("receive: {0}")]
    Receive(String),
    /// Reply bytes do not parse as a valid protocol reply.
    #[error("malformed reply: {0}")]
    MalformedReply(String),
    /// Ciphertext was not decryptable with the held key.
    #[error("decryption: {0}")]
    Decryption(String),
    /// Protocol misuse: sending an unsigned request or re-signing a signed one.
    #[error("protocol: {0}")]
    Protocol(String),
}

impl ClientError {
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::Configuration(_) => "configuration",
            ClientError::Connection(_) => "connection",
            ClientError::Signing(_) => "signing",
            ClientError::Send(_) => "send",
            ClientError::Receive(_) => "receive",
            ClientError::MalformedReply(_) => "malformed reply",
            ClientError::Decryption(_) => "decryption",
            ClientError::Protocol(_) => "protocol",
        }
    }
}
