//! Client-to-server RFB messages.
//!
//! Each message is one type byte followed by its fixed layout; see the
//! individual types for the exact wire format. `write_to` only stages bytes
//! in the output stream — the caller flushes, so one message always reaches
//! the transport contiguously.

use super::{string_to_latin1, write_pixel_format};
use crate::io::{RfbInStream, RfbOutStream};
use rvnc_pixels::PixelFormat;
use tokio::io::{AsyncRead, AsyncWrite};

/// ClientInit — one byte: the shared-session flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInit {
    pub shared: bool,
}

impl ClientInit {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(u8::from(self.shared));
    }
}

/// SetPixelFormat (type 0) — 3 pad bytes, then the 16-byte format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPixelFormat {
    pub pixel_format: PixelFormat,
}

impl SetPixelFormat {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(0);
        stream.write_padding(3);
        write_pixel_format(&self.pixel_format, stream);
    }
}

/// SetEncodings (type 2) — 1 pad byte, u16 count, count i32 tags in
/// preference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEncodings {
    pub encodings: Vec<i32>,
}

impl SetEncodings {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(2);
        stream.write_padding(1);
        stream.write_u16(self.encodings.len() as u16);
        for &encoding in &self.encodings {
            stream.write_i32(encoding);
        }
    }
}

/// FramebufferUpdateRequest (type 3) — incremental flag and the region of
/// interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferUpdateRequest {
    pub incremental: bool,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl FramebufferUpdateRequest {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(3);
        stream.write_u8(u8::from(self.incremental));
        stream.write_u16(self.x);
        stream.write_u16(self.y);
        stream.write_u16(self.width);
        stream.write_u16(self.height);
    }

    /// Read the message body (after the type byte); used by test servers.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        let incremental = stream.read_u8().await? != 0;
        Ok(Self {
            incremental,
            x: stream.read_u16().await?,
            y: stream.read_u16().await?,
            width: stream.read_u16().await?,
            height: stream.read_u16().await?,
        })
    }
}

/// KeyEvent (type 4) — down flag, 2 pad bytes, X11 keysym.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub down: bool,
    pub keysym: u32,
}

impl KeyEvent {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(4);
        stream.write_u8(u8::from(self.down));
        stream.write_padding(2);
        stream.write_u32(self.keysym);
    }
}

/// PointerEvent (type 5) — button mask and position.
///
/// Mask bits: 0 left, 1 middle, 2 right, 3 wheel up, 4 wheel down; bits
/// 5 through 7 are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub button_mask: u8,
    pub x: u16,
    pub y: u16,
}

impl PointerEvent {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(5);
        stream.write_u8(self.button_mask);
        stream.write_u16(self.x);
        stream.write_u16(self.y);
    }
}

/// ClientCutText (type 6) — 3 pad bytes, u32 length, Latin-1 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCutText {
    pub text: String,
}

impl ClientCutText {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        let bytes = string_to_latin1(&self.text);
        stream.write_u8(6);
        stream.write_padding(3);
        stream.write_u32(bytes.len() as u32);
        stream.write_bytes(&bytes);
    }
}
