//! Error type for the session controller.

use rvnc_wire::handshake::HandshakeError;
use std::io;
use thiserror::Error;

/// Everything that can go wrong over the lifetime of a session.
///
/// Handshake errors surface synchronously from the lifecycle calls.
/// Errors observed by the reader task after the session is connected are
/// reported through the `ConnectionLost` event instead; `Protocol` and
/// `Decode` failures are fatal for the connection and never retried.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport failure, including EOF in the middle of a message.
    #[error("network error: {0}")]
    Network(#[from] io::Error),

    /// The server offered a protocol version below 3.3.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// No security scheme both sides support.
    #[error("no acceptable security type: {0}")]
    InvalidSecurityType(String),

    /// The server rejected the authentication response.
    #[error("authentication failed{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    AuthFailed { reason: Option<String> },

    /// The server refuses further authentication attempts.
    #[error("authentication rejected: too many attempts")]
    AuthTooMany,

    /// The host declined to supply a password.
    #[error("authentication aborted")]
    AuthAborted,

    /// The server sent something the protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A rectangle failed to decode (bad zlib data, truncated tiles...).
    #[error("decode error: {0:#}")]
    Decode(#[from] anyhow::Error),

    /// A lifecycle method was called out of order.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration rejected before any I/O happened.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<HandshakeError> for SessionError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::Io(e) => Self::Network(e),
            HandshakeError::UnsupportedVersion(v) => Self::UnsupportedVersion(v),
            HandshakeError::InvalidSecurityType(r) => Self::InvalidSecurityType(r),
            HandshakeError::AuthFailed { reason } => Self::AuthFailed { reason },
            HandshakeError::AuthTooMany => Self::AuthTooMany,
        }
    }
}
