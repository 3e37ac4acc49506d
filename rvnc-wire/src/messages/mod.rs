//! RFB message codecs.
//!
//! Split by direction the way the protocol specification is:
//! [`client`] holds everything the client sends, [`server`] everything it
//! receives. The [`Rectangle`] header and the pixel-format field codec are
//! shared by both.

use crate::io::{RfbInStream, RfbOutStream};
use rvnc_pixels::PixelFormat;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod client;
pub mod server;

pub use client::{
    ClientCutText, ClientInit, FramebufferUpdateRequest, KeyEvent, PointerEvent, SetEncodings,
    SetPixelFormat,
};
pub use server::{Bell, ColorMapEntry, ServerCutText, ServerInit, SetColorMapEntries};

/// Rectangle header inside a FramebufferUpdate.
///
/// Twelve bytes on the wire: four u16 coordinates followed by the signed
/// encoding tag. The encoded pixel data follows immediately and is consumed
/// by the decoder matching the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: i32,
}

impl Rectangle {
    /// Read a rectangle header.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            x: stream.read_u16().await?,
            y: stream.read_u16().await?,
            width: stream.read_u16().await?,
            height: stream.read_u16().await?,
            encoding: stream.read_i32().await?,
        })
    }

    /// Write a rectangle header.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u16(self.x);
        stream.write_u16(self.y);
        stream.write_u16(self.width);
        stream.write_u16(self.height);
        stream.write_i32(self.encoding);
    }
}

/// Read the 16-byte pixel format field, validating the boolean flags.
pub async fn read_pixel_format<R: AsyncRead + Unpin>(
    stream: &mut RfbInStream<R>,
) -> std::io::Result<PixelFormat> {
    let bits_per_pixel = stream.read_u8().await?;
    let depth = stream.read_u8().await?;
    let big_endian = stream.read_u8().await?;
    let true_color = stream.read_u8().await?;

    if big_endian > 1 || true_color > 1 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "pixel format flags must be 0 or 1 (big_endian={}, true_color={})",
                big_endian, true_color
            ),
        ));
    }

    let red_max = stream.read_u16().await?;
    let green_max = stream.read_u16().await?;
    let blue_max = stream.read_u16().await?;
    let red_shift = stream.read_u8().await?;
    let green_shift = stream.read_u8().await?;
    let blue_shift = stream.read_u8().await?;
    stream.skip(3).await?; // padding

    Ok(PixelFormat {
        bits_per_pixel,
        depth,
        big_endian,
        true_color,
        red_max,
        green_max,
        blue_max,
        red_shift,
        green_shift,
        blue_shift,
    })
}

/// Write the 16-byte pixel format field.
pub fn write_pixel_format<W: AsyncWrite + Unpin>(
    format: &PixelFormat,
    stream: &mut RfbOutStream<W>,
) {
    stream.write_u8(format.bits_per_pixel);
    stream.write_u8(format.depth);
    stream.write_u8(format.big_endian);
    stream.write_u8(format.true_color);
    stream.write_u16(format.red_max);
    stream.write_u16(format.green_max);
    stream.write_u16(format.blue_max);
    stream.write_u8(format.red_shift);
    stream.write_u8(format.green_shift);
    stream.write_u8(format.blue_shift);
    stream.write_padding(3);
}

/// Cut-text payloads are Latin-1 on the wire: each byte is one code point.
pub(crate) fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode text as Latin-1, substituting `?` for unrepresentable characters.
pub(crate) fn string_to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}
