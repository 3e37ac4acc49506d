//! RFB protocol handshake: version negotiation, security negotiation and
//! the security result.
//!
//! The client supports protocol versions 3.3, 3.7 and 3.8 and negotiates to
//! the highest of those not above what the server reports. Two real-world
//! banner quirks are folded in:
//!
//! - a minor version of 8 or more (one OS X server reports 3.889) counts
//!   as 3.8;
//! - UltraVNC's 3.6 banner counts as 3.3.
//!
//! Security differs by version. 3.3 has the server pick a type and announce
//! it as a u32; 3.7 and 3.8 send a list of u8 types for the client to choose
//! from. The SecurityResult u32 is always present in 3.8 but only follows
//! VNC authentication in 3.3 and 3.7, and only 3.8 attaches a reason string
//! to a failure.

use crate::io::{RfbInStream, RfbOutStream};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Errors produced during the handshake phases.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("no acceptable security type: {0}")]
    InvalidSecurityType(String),

    #[error("authentication failed{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    AuthFailed { reason: Option<String> },

    #[error("authentication rejected: too many attempts")]
    AuthTooMany,
}

/// A negotiated RFB protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V3_3,
    V3_7,
    V3_8,
}

impl ProtocolVersion {
    /// The exact 12-byte banner for this version.
    pub const fn banner(self) -> &'static [u8; 12] {
        match self {
            Self::V3_3 => b"RFB 003.003\n",
            Self::V3_7 => b"RFB 003.007\n",
            Self::V3_8 => b"RFB 003.008\n",
        }
    }
}

/// Security scheme agreed on with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityType {
    None,
    VncAuth,
}

const SECURITY_INVALID: u8 = 0;
const SECURITY_NONE: u8 = 1;
const SECURITY_VNC_AUTH: u8 = 2;

/// Longest failure-reason string accepted from a server.
const MAX_REASON_LEN: usize = 4096;

/// Read the server banner, pick the protocol version and reply with the
/// matching banner.
pub async fn negotiate_version<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    instream: &mut RfbInStream<R>,
    outstream: &mut RfbOutStream<W>,
) -> Result<ProtocolVersion, HandshakeError> {
    let mut banner = [0u8; 12];
    instream.read_bytes(&mut banner).await?;

    if &banner[0..4] != b"RFB " || banner[7] != b'.' || banner[11] != b'\n' {
        return Err(HandshakeError::UnsupportedVersion(format!(
            "malformed banner {:?}",
            String::from_utf8_lossy(&banner)
        )));
    }

    let parse = |digits: &[u8]| -> Result<u32, HandshakeError> {
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                HandshakeError::UnsupportedVersion(format!(
                    "non-numeric banner {:?}",
                    String::from_utf8_lossy(&banner)
                ))
            })
    };
    let major = parse(&banner[4..7])?;
    let minor = parse(&banner[8..11])?;

    let version = match (major, minor) {
        (4.., _) => ProtocolVersion::V3_8,
        (3, 8..) => ProtocolVersion::V3_8,
        (3, 7) => ProtocolVersion::V3_7,
        // 3.3 through 3.6; UltraVNC reports 3.6 but speaks 3.3.
        (3, 3..=6) => ProtocolVersion::V3_3,
        _ => {
            return Err(HandshakeError::UnsupportedVersion(format!(
                "{}.{}",
                major, minor
            )))
        }
    };

    tracing::debug!(
        "server banner {:?}, negotiated {:?}",
        String::from_utf8_lossy(&banner).trim_end(),
        version
    );

    outstream.write_bytes(version.banner());
    outstream.flush().await?;
    Ok(version)
}

/// Negotiate the security type for the given protocol version.
///
/// VNC authentication is preferred over None when the server offers both,
/// so a password-protected server is never downgraded.
pub async fn negotiate_security<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    instream: &mut RfbInStream<R>,
    outstream: &mut RfbOutStream<W>,
    version: ProtocolVersion,
) -> Result<SecurityType, HandshakeError> {
    match version {
        ProtocolVersion::V3_3 => {
            let security = instream.read_u32().await?;
            match security {
                t if t == SECURITY_INVALID as u32 => {
                    let reason = read_reason(instream).await?;
                    Err(HandshakeError::InvalidSecurityType(reason))
                }
                t if t == SECURITY_NONE as u32 => Ok(SecurityType::None),
                t if t == SECURITY_VNC_AUTH as u32 => Ok(SecurityType::VncAuth),
                other => Err(HandshakeError::InvalidSecurityType(format!(
                    "server chose unknown security type {}",
                    other
                ))),
            }
        }
        ProtocolVersion::V3_7 | ProtocolVersion::V3_8 => {
            let count = instream.read_u8().await?;
            if count == 0 {
                let reason = read_reason(instream).await?;
                return Err(HandshakeError::InvalidSecurityType(reason));
            }

            let mut types = vec![0u8; count as usize];
            instream.read_bytes(&mut types).await?;

            let chosen = if types.contains(&SECURITY_VNC_AUTH) {
                SecurityType::VncAuth
            } else if types.contains(&SECURITY_NONE) {
                SecurityType::None
            } else {
                return Err(HandshakeError::InvalidSecurityType(format!(
                    "server offered {:?}",
                    types
                )));
            };

            outstream.write_u8(match chosen {
                SecurityType::None => SECURITY_NONE,
                SecurityType::VncAuth => SECURITY_VNC_AUTH,
            });
            outstream.flush().await?;
            Ok(chosen)
        }
    }
}

/// Read the 16-byte VNC authentication challenge.
pub async fn read_challenge<R: AsyncRead + Unpin>(
    instream: &mut RfbInStream<R>,
) -> Result<[u8; 16], HandshakeError> {
    let mut challenge = [0u8; 16];
    instream.read_bytes(&mut challenge).await?;
    Ok(challenge)
}

/// Send the 16-byte challenge response.
pub async fn send_auth_response<W: AsyncWrite + Unpin>(
    outstream: &mut RfbOutStream<W>,
    response: &[u8; 16],
) -> Result<(), HandshakeError> {
    outstream.write_bytes(response);
    outstream.flush().await?;
    Ok(())
}

/// Read the SecurityResult word: 0 = OK, 1 = Failed, 2 = TooMany.
///
/// In 3.8 a failure carries a reason string; earlier versions do not.
pub async fn read_security_result<R: AsyncRead + Unpin>(
    instream: &mut RfbInStream<R>,
    version: ProtocolVersion,
) -> Result<(), HandshakeError> {
    let result = instream.read_u32().await?;
    match result {
        0 => Ok(()),
        1 => {
            let reason = if version == ProtocolVersion::V3_8 {
                Some(read_reason(instream).await?)
            } else {
                None
            };
            Err(HandshakeError::AuthFailed { reason })
        }
        2 => Err(HandshakeError::AuthTooMany),
        other => Err(HandshakeError::AuthFailed {
            reason: Some(format!("unknown security result {}", other)),
        }),
    }
}

async fn read_reason<R: AsyncRead + Unpin>(
    instream: &mut RfbInStream<R>,
) -> Result<String, HandshakeError> {
    let bytes = instream.read_string(MAX_REASON_LEN).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
