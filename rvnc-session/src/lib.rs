//! High-level async RFB (VNC) client session.
//!
//! This crate ties the lower layers together into the session controller a
//! host application talks to: it owns the transport, the reader task, the
//! framebuffer and the event surface.
//!
//! # Concurrency model
//!
//! Two logical threads of control per connection: the reader task blocks
//! on the transport, parses server messages, mutates the framebuffer and
//! posts [`SessionEvent`]s; the caller issues writes (input events, update
//! requests, disconnect), serialized through a single write mutex so
//! message bytes never interleave. The framebuffer is written only by the
//! reader task; the host locks it to paint and repaints on
//! [`SessionEvent::FramebufferUpdated`].
//!
//! # Quick start
//!
//! ```no_run
//! use rvnc_session::{Config, Session, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder().host("localhost").display(1).build()?;
//!     let (mut session, needs_password) = Session::connect(config).await?;
//!     if needs_password {
//!         session.authenticate("secret").await?;
//!     }
//!     session.initialize().await?;
//!     session.start_updates().await?;
//!
//!     while let Ok(event) = session.events().recv_async().await {
//!         match event {
//!             SessionEvent::FramebufferUpdated(dirty) => {
//!                 // repaint `dirty` from session.framebuffer()
//!                 let _ = dirty;
//!             }
//!             SessionEvent::ConnectionLost { .. } => break,
//!             _ => {}
//!         }
//!     }
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod errors;
pub mod events;
pub mod keysyms;

mod reader;
mod registry;
mod session;

pub use config::Config;
pub use errors::SessionError;
pub use events::{ConnectionState, SessionEvent};
pub use session::Session;

use rvnc_pixels::Framebuffer;
use rvnc_wire::io::RfbOutStream;
use std::sync::Arc;

/// Read half of the transport, type-erased so any byte stream works.
pub type BoxedReader = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Write half of the transport.
pub type BoxedWriter = Box<dyn tokio::io::AsyncWrite + Send + Unpin>;

/// Shared handle to the session framebuffer.
///
/// The reader task is the only writer; the host takes the lock to paint.
pub type FramebufferHandle = Arc<tokio::sync::Mutex<Framebuffer>>;

pub(crate) type SharedOutput = Arc<tokio::sync::Mutex<RfbOutStream<BoxedWriter>>>;
