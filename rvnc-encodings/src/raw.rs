//! Raw encoding (type 0): uncompressed wire pixels.
//!
//! # Wire Format
//!
//! ```text
//! +-------------+
//! | pixel data  |  width * height * bytes_per_pixel, row-major
//! +-------------+
//! ```
//!
//! In the canonical pixel format each row is a run of 4-byte little-endian
//! quads and translation is a straight copy; other formats go through the
//! general channel extraction.

use crate::{Decoder, ENCODING_RAW};
use anyhow::{Context, Result};
use rvnc_pixels::{ColorMap, Framebuffer, PixelFormat, PixelReader};
use rvnc_wire::io::RfbInStream;
use rvnc_wire::messages::Rectangle;
use tokio::io::AsyncRead;

/// Decoder for raw, uncompressed pixel data.
pub struct RawDecoder;

impl Decoder for RawDecoder {
    fn encoding(&self) -> i32 {
        ENCODING_RAW
    }

    async fn decode<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        format: &PixelFormat,
        colors: &ColorMap,
        framebuffer: &mut Framebuffer,
    ) -> Result<()> {
        if rect.width == 0 || rect.height == 0 {
            return Ok(());
        }

        let reader = PixelReader::new(format, colors);
        let total = rect.width as usize * rect.height as usize * reader.bytes_per_pixel();
        let mut data = vec![0u8; total];
        stream
            .read_bytes(&mut data)
            .await
            .context("failed to read raw pixel data")?;

        blit_raw(&data, rect, &reader, framebuffer)
    }
}

/// Write a buffer of raw wire pixels (row-major, tightly packed) into the
/// framebuffer at the rectangle's position. Shared with the Zlib decoder,
/// whose decompressed payload has exactly this layout.
pub(crate) fn blit_raw(
    data: &[u8],
    rect: &Rectangle,
    reader: &PixelReader<'_>,
    framebuffer: &mut Framebuffer,
) -> Result<()> {
    let row_bytes = rect.width as usize * reader.bytes_per_pixel();
    let expected = row_bytes * rect.height as usize;
    if data.len() != expected {
        anyhow::bail!(
            "raw rectangle {}x{} wants {} bytes, got {}",
            rect.width,
            rect.height,
            expected,
            data.len()
        );
    }

    let mut row = Vec::with_capacity(rect.width as usize);
    for y in 0..rect.height {
        row.clear();
        let start = y as usize * row_bytes;
        reader.decode_row(&data[start..start + row_bytes], &mut row)?;
        framebuffer
            .write_row(rect.x, rect.y + y, &row)
            .with_context(|| format!("raw row {} does not fit the framebuffer", y))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn rect(x: u16, y: u16, w: u16, h: u16) -> Rectangle {
        Rectangle {
            x,
            y,
            width: w,
            height: h,
            encoding: ENCODING_RAW,
        }
    }

    #[tokio::test]
    async fn canonical_pixels_are_copied() {
        let format = PixelFormat::canonical();
        let colors = ColorMap::new();
        let mut fb = Framebuffer::new(4, 2, "");

        // Blue then green, little-endian BGRX quads.
        let data = vec![0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00];
        let mut stream = RfbInStream::new(Cursor::new(data));

        RawDecoder
            .decode(&mut stream, &rect(0, 0, 2, 1), &format, &colors, &mut fb)
            .await
            .unwrap();

        assert_eq!(fb.pixel(0, 0), Some(0x0000_00FF));
        assert_eq!(fb.pixel(1, 0), Some(0x0000_FF00));
        assert_eq!(fb.pixel(2, 0), Some(0));
    }

    #[tokio::test]
    async fn rows_land_at_the_rectangle_offset() {
        let format = PixelFormat::canonical();
        let colors = ColorMap::new();
        let mut fb = Framebuffer::new(4, 4, "");

        let mut data = Vec::new();
        for v in 1u8..=4 {
            data.extend_from_slice(&[v, 0, 0, 0]);
        }
        let mut stream = RfbInStream::new(Cursor::new(data));

        RawDecoder
            .decode(&mut stream, &rect(1, 2, 2, 2), &format, &colors, &mut fb)
            .await
            .unwrap();

        assert_eq!(fb.pixel(1, 2), Some(1));
        assert_eq!(fb.pixel(2, 2), Some(2));
        assert_eq!(fb.pixel(1, 3), Some(3));
        assert_eq!(fb.pixel(2, 3), Some(4));
        assert_eq!(fb.pixel(0, 2), Some(0));
    }

    #[tokio::test]
    async fn sixteen_bit_pixels_are_translated() {
        let format = PixelFormat {
            bits_per_pixel: 16,
            depth: 16,
            big_endian: 0,
            true_color: 1,
            red_max: 31,
            green_max: 63,
            blue_max: 31,
            red_shift: 11,
            green_shift: 5,
            blue_shift: 0,
        };
        let colors = ColorMap::new();
        let mut fb = Framebuffer::new(2, 1, "");

        // Pure red in RGB565, little-endian.
        let mut stream = RfbInStream::new(Cursor::new(vec![0x00, 0xF8, 0xE0, 0x07]));
        RawDecoder
            .decode(&mut stream, &rect(0, 0, 2, 1), &format, &colors, &mut fb)
            .await
            .unwrap();

        assert_eq!(fb.pixel(0, 0), Some(0x00FF_0000));
        assert_eq!(fb.pixel(1, 0), Some(0x0000_FF00));
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error() {
        let format = PixelFormat::canonical();
        let colors = ColorMap::new();
        let mut fb = Framebuffer::new(4, 4, "");
        let mut stream = RfbInStream::new(Cursor::new(vec![0u8; 7]));

        let err = RawDecoder
            .decode(&mut stream, &rect(0, 0, 2, 1), &format, &colors, &mut fb)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("raw pixel data"));
    }

    #[tokio::test]
    async fn out_of_bounds_rectangle_is_an_error() {
        let format = PixelFormat::canonical();
        let colors = ColorMap::new();
        let mut fb = Framebuffer::new(4, 4, "");
        let mut stream = RfbInStream::new(Cursor::new(vec![0u8; 2 * 2 * 4]));

        assert!(RawDecoder
            .decode(&mut stream, &rect(3, 3, 2, 2), &format, &colors, &mut fb)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn empty_rectangle_reads_nothing() {
        let format = PixelFormat::canonical();
        let colors = ColorMap::new();
        let mut fb = Framebuffer::new(4, 4, "");
        let mut stream = RfbInStream::new(Cursor::new(Vec::<u8>::new()));

        RawDecoder
            .decode(&mut stream, &rect(0, 0, 0, 3), &format, &colors, &mut fb)
            .await
            .unwrap();
    }
}
