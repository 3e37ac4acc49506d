//! Zlib encoding (type 6): a zlib-compressed Raw rectangle.
//!
//! # Wire Format
//!
//! ```text
//! +-----------+------------------+
//! | length    | compressed bytes |
//! | u32       | length bytes     |
//! +-----------+------------------+
//! ```
//!
//! The compressed bytes are a slice of the connection's continuous zlib
//! stream (shared with ZRLE); inflating them must yield exactly
//! `width * height * bytes_per_pixel` bytes, which are then handled like a
//! Raw rectangle.

use crate::raw::blit_raw;
use crate::zlib_stream::SharedZlibStream;
use crate::{Decoder, ENCODING_ZLIB, MAX_COMPRESSED_LEN};
use anyhow::{bail, Context, Result};
use rvnc_pixels::{ColorMap, Framebuffer, PixelFormat, PixelReader};
use rvnc_wire::io::RfbInStream;
use rvnc_wire::messages::Rectangle;
use tokio::io::AsyncRead;

/// Decoder for Zlib-compressed Raw rectangles.
pub struct ZlibDecoder {
    stream: SharedZlibStream,
}

impl ZlibDecoder {
    /// Build a decoder over the connection's shared inflate stream.
    pub fn new(stream: SharedZlibStream) -> Self {
        Self { stream }
    }
}

impl Decoder for ZlibDecoder {
    fn encoding(&self) -> i32 {
        ENCODING_ZLIB
    }

    async fn decode<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        format: &PixelFormat,
        colors: &ColorMap,
        framebuffer: &mut Framebuffer,
    ) -> Result<()> {
        let length = stream
            .read_u32()
            .await
            .context("failed to read Zlib data length")?;
        let compressed = stream
            .read_sized(length as usize, MAX_COMPRESSED_LEN)
            .await
            .context("failed to read Zlib compressed data")?;

        let decompressed = self
            .stream
            .lock()
            .expect("zlib stream lock poisoned")
            .inflate(&compressed)
            .context("Zlib rectangle failed to inflate")?;

        let reader = PixelReader::new(format, colors);
        let expected = rect.width as usize * rect.height as usize * reader.bytes_per_pixel();
        if decompressed.len() != expected {
            bail!(
                "Zlib rectangle {}x{} inflated to {} bytes, expected {}",
                rect.width,
                rect.height,
                decompressed.len(),
                expected
            );
        }

        blit_raw(&decompressed, rect, &reader, framebuffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zlib_stream::ZlibStream;
    use flate2::{Compress, Compression, FlushCompress};
    use std::io::Cursor;

    fn rect(x: u16, y: u16, w: u16, h: u16) -> Rectangle {
        Rectangle {
            x,
            y,
            width: w,
            height: h,
            encoding: ENCODING_ZLIB,
        }
    }

    /// Compress `payload` as the next slice of `compressor`'s stream and
    /// frame it with the u32 length prefix.
    fn frame(compressor: &mut Compress, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; payload.len() + 128];
        let before = compressor.total_out();
        compressor
            .compress(payload, &mut out, FlushCompress::Sync)
            .unwrap();
        let len = (compressor.total_out() - before) as usize;

        let mut framed = Vec::with_capacity(4 + len);
        framed.extend_from_slice(&(len as u32).to_be_bytes());
        framed.extend_from_slice(&out[..len]);
        framed
    }

    fn pixels(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[tokio::test]
    async fn inflates_into_a_raw_rectangle() {
        let mut compressor = Compress::new(Compression::default(), true);
        let body = frame(&mut compressor, &pixels(&[0x0000_00FF, 0x0000_FF00]));

        let shared = ZlibStream::shared();
        let decoder = ZlibDecoder::new(shared);
        let mut fb = Framebuffer::new(4, 4, "");
        let mut stream = RfbInStream::new(Cursor::new(body));
        decoder
            .decode(
                &mut stream,
                &rect(0, 0, 2, 1),
                &PixelFormat::canonical(),
                &ColorMap::new(),
                &mut fb,
            )
            .await
            .unwrap();

        assert_eq!(fb.pixel(0, 0), Some(0x0000_00FF));
        assert_eq!(fb.pixel(1, 0), Some(0x0000_FF00));
    }

    #[tokio::test]
    async fn consecutive_rectangles_share_the_stream() {
        let mut compressor = Compress::new(Compression::default(), true);
        let first = frame(&mut compressor, &pixels(&[1, 2]));
        let second = frame(&mut compressor, &pixels(&[3, 4]));

        let shared = ZlibStream::shared();
        let decoder = ZlibDecoder::new(shared);
        let mut fb = Framebuffer::new(2, 2, "");

        let mut stream = RfbInStream::new(Cursor::new(first));
        decoder
            .decode(
                &mut stream,
                &rect(0, 0, 2, 1),
                &PixelFormat::canonical(),
                &ColorMap::new(),
                &mut fb,
            )
            .await
            .unwrap();

        // The second slice has no zlib header and only decodes through the
        // carried-over inflate state.
        let mut stream = RfbInStream::new(Cursor::new(second));
        decoder
            .decode(
                &mut stream,
                &rect(0, 1, 2, 1),
                &PixelFormat::canonical(),
                &ColorMap::new(),
                &mut fb,
            )
            .await
            .unwrap();

        assert_eq!(fb.data(), &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn wrong_decompressed_size_is_an_error() {
        let mut compressor = Compress::new(Compression::default(), true);
        // One pixel short of a 2x1 rectangle.
        let body = frame(&mut compressor, &pixels(&[7]));

        let decoder = ZlibDecoder::new(ZlibStream::shared());
        let mut fb = Framebuffer::new(4, 4, "");
        let mut stream = RfbInStream::new(Cursor::new(body));
        let err = decoder
            .decode(
                &mut stream,
                &rect(0, 0, 2, 1),
                &PixelFormat::canonical(),
                &ColorMap::new(),
                &mut fb,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected"));
    }

    #[tokio::test]
    async fn absurd_length_prefix_is_rejected_up_front() {
        // Nothing but a hostile length word; the decoder must refuse it
        // without waiting for (or allocating) the declared payload.
        let body = u32::MAX.to_be_bytes().to_vec();

        let decoder = ZlibDecoder::new(ZlibStream::shared());
        let mut fb = Framebuffer::new(4, 4, "");
        let mut stream = RfbInStream::new(Cursor::new(body));
        let err = decoder
            .decode(
                &mut stream,
                &rect(0, 0, 1, 1),
                &PixelFormat::canonical(),
                &ColorMap::new(),
                &mut fb,
            )
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("limit"));
    }

    #[tokio::test]
    async fn corrupt_stream_is_an_error() {
        let mut body = 4u32.to_be_bytes().to_vec();
        body.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let decoder = ZlibDecoder::new(ZlibStream::shared());
        let mut fb = Framebuffer::new(4, 4, "");
        let mut stream = RfbInStream::new(Cursor::new(body));
        assert!(decoder
            .decode(
                &mut stream,
                &rect(0, 0, 1, 1),
                &PixelFormat::canonical(),
                &ColorMap::new(),
                &mut fb,
            )
            .await
            .is_err());
    }
}
