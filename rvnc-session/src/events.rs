//! Host-facing events and the connection state machine.

use rvnc_common::Rect;

/// Events delivered to the host from the reader task.
///
/// All of them are emitted from the session's reader task; the host does
/// whatever cross-thread marshalling its UI needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection is gone, with a reason when one is known.
    ///
    /// Emitted exactly once per session no matter how many parties observe
    /// the failure.
    ConnectionLost { reason: Option<String> },

    /// A framebuffer update finished; the rectangle bounds all the
    /// rectangles of the update, and the host should repaint it.
    FramebufferUpdated(Rect),

    /// The server put text on the clipboard.
    ServerCutText(String),

    /// The server rang the bell.
    Bell,
}

/// Lifecycle of a session.
///
/// Transitions run strictly forward through the handshake states, plus
/// any-state to `Disconnecting` to `Disconnected` on error or teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    HandshakingVersion,
    HandshakingSecurity,
    Authenticating,
    Initializing,
    Connected,
    Disconnecting,
}
