//! Server-to-client RFB messages.
//!
//! The message-type byte is consumed by the session's demultiplexer before
//! these `read_from` helpers run, so each one parses only the body. The
//! FramebufferUpdate body is intentionally not modeled here: its rectangle
//! headers are interleaved with encoded pixel data, so the update reader
//! consumes the pad byte and count itself and alternates header reads with
//! decoder invocations.

use super::{latin1_to_string, read_pixel_format, string_to_latin1, write_pixel_format};
use crate::io::{RfbInStream, RfbOutStream};
use rvnc_pixels::PixelFormat;
use tokio::io::{AsyncRead, AsyncWrite};

/// Longest desktop name accepted in ServerInit.
const MAX_NAME_LEN: usize = 4096;

/// Longest clipboard payload accepted from the server.
const MAX_CUT_TEXT_LEN: usize = 1 << 20;

/// ServerInit — framebuffer dimensions, pixel format and desktop name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInit {
    pub width: u16,
    pub height: u16,
    pub pixel_format: PixelFormat,
    pub name: String,
}

impl ServerInit {
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        let width = stream.read_u16().await?;
        let height = stream.read_u16().await?;
        let pixel_format = read_pixel_format(stream).await?;
        let name_bytes = stream.read_string(MAX_NAME_LEN).await?;
        let name = String::from_utf8_lossy(&name_bytes).into_owned();
        Ok(Self {
            width,
            height,
            pixel_format,
            name,
        })
    }

    /// Write a ServerInit; used by the test servers in this workspace.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u16(self.width);
        stream.write_u16(self.height);
        write_pixel_format(&self.pixel_format, stream);
        stream.write_u32(self.name.len() as u32);
        stream.write_bytes(self.name.as_bytes());
    }
}

/// One palette entry in a SetColourMapEntries message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMapEntry {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

/// SetColourMapEntries (type 1) — palette update for indexed color modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetColorMapEntries {
    pub first_color: u16,
    pub colors: Vec<ColorMapEntry>,
}

impl SetColorMapEntries {
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        stream.skip(1).await?; // padding
        let first_color = stream.read_u16().await?;
        let count = stream.read_u16().await? as usize;

        let mut colors = Vec::with_capacity(count);
        for _ in 0..count {
            colors.push(ColorMapEntry {
                red: stream.read_u16().await?,
                green: stream.read_u16().await?,
                blue: stream.read_u16().await?,
            });
        }

        Ok(Self {
            first_color,
            colors,
        })
    }
}

/// Bell (type 2) — no body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bell;

/// ServerCutText (type 3) — 3 pad bytes, u32 length, Latin-1 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCutText {
    pub text: String,
}

impl ServerCutText {
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        stream.skip(3).await?; // padding
        let bytes = stream.read_string(MAX_CUT_TEXT_LEN).await?;
        Ok(Self {
            text: latin1_to_string(&bytes),
        })
    }

    /// Write a ServerCutText (including the type byte); for test servers.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        let bytes = string_to_latin1(&self.text);
        stream.write_u8(3);
        stream.write_padding(3);
        stream.write_u32(bytes.len() as u32);
        stream.write_bytes(&bytes);
    }
}
