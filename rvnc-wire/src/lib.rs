//! RFB wire protocol: framing, handshake, authentication and messages.
//!
//! This crate owns everything that touches raw protocol bytes:
//!
//! - [`io`] — buffered big-endian input/output streams
//! - [`handshake`] — version negotiation, security negotiation and the
//!   security result, for RFB 3.3, 3.7 and 3.8
//! - [`auth`] — the DES-based VNC authentication challenge response
//! - [`messages`] — every client-to-server and server-to-client message
//!
//! All multi-byte integers are network byte order per the RFB specification.

pub mod auth;
pub mod handshake;
pub mod io;
pub mod messages;

pub use handshake::{HandshakeError, ProtocolVersion, SecurityType};
pub use io::{RfbInStream, RfbOutStream};
