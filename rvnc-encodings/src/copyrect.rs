//! CopyRect encoding (type 1): move a block within the framebuffer.
//!
//! # Wire Format
//!
//! ```text
//! +-------+-------+
//! | src_x | src_y |  u16 each
//! +-------+-------+
//! ```
//!
//! The rectangle header names the destination; the body carries only the
//! source corner. Overlapping source and destination are legal and common
//! (scrolling), and the framebuffer picks the copy direction from the sign
//! of the offset so the destination always receives the source's pre-copy
//! pixels.

use crate::{Decoder, ENCODING_COPY_RECT};
use anyhow::{Context, Result};
use rvnc_pixels::{ColorMap, Framebuffer, PixelFormat};
use rvnc_wire::io::RfbInStream;
use rvnc_wire::messages::Rectangle;
use tokio::io::AsyncRead;

/// Decoder for CopyRect block moves.
pub struct CopyRectDecoder;

impl Decoder for CopyRectDecoder {
    fn encoding(&self) -> i32 {
        ENCODING_COPY_RECT
    }

    async fn decode<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        _format: &PixelFormat,
        _colors: &ColorMap,
        framebuffer: &mut Framebuffer,
    ) -> Result<()> {
        let src_x = stream
            .read_u16()
            .await
            .context("failed to read CopyRect src_x")?;
        let src_y = stream
            .read_u16()
            .await
            .context("failed to read CopyRect src_y")?;

        framebuffer
            .copy_rect(src_x, src_y, rect.x, rect.y, rect.width, rect.height)
            .with_context(|| {
                format!(
                    "CopyRect {}x{} from ({}, {}) to ({}, {}) is out of bounds",
                    rect.width, rect.height, src_x, src_y, rect.x, rect.y
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn gradient(size: u16) -> Framebuffer {
        let mut fb = Framebuffer::new(size, size, "");
        for y in 0..size {
            for x in 0..size {
                fb.write_pixel(x, y, (y as u32) << 16 | x as u32).unwrap();
            }
        }
        fb
    }

    fn rect(x: u16, y: u16, w: u16, h: u16) -> Rectangle {
        Rectangle {
            x,
            y,
            width: w,
            height: h,
            encoding: ENCODING_COPY_RECT,
        }
    }

    async fn run(fb: &mut Framebuffer, dst: Rectangle, src: (u16, u16)) -> Result<()> {
        let body = vec![
            (src.0 >> 8) as u8,
            src.0 as u8,
            (src.1 >> 8) as u8,
            src.1 as u8,
        ];
        let mut stream = RfbInStream::new(Cursor::new(body));
        CopyRectDecoder
            .decode(
                &mut stream,
                &dst,
                &PixelFormat::canonical(),
                &ColorMap::new(),
                fb,
            )
            .await
    }

    #[tokio::test]
    async fn copies_a_block() {
        let mut fb = gradient(32);
        run(&mut fb, rect(20, 20, 4, 4), (2, 3)).await.unwrap();
        for dy in 0..4u16 {
            for dx in 0..4u16 {
                assert_eq!(
                    fb.pixel(20 + dx, 20 + dy),
                    Some(((3 + dy) as u32) << 16 | (2 + dx) as u32)
                );
            }
        }
    }

    #[tokio::test]
    async fn overlap_preserves_source_pixels() {
        // Destination (0,0) overlaps source (5,5): the destination must end
        // up with the source's original gradient values.
        let before = gradient(32);
        let mut fb = before.clone();
        run(&mut fb, rect(0, 0, 10, 10), (5, 5)).await.unwrap();
        for dy in 0..10u16 {
            for dx in 0..10u16 {
                assert_eq!(fb.pixel(dx, dy), before.pixel(5 + dx, 5 + dy));
            }
        }

        // And in the other overlap orientation.
        let mut fb = before.clone();
        run(&mut fb, rect(5, 5, 10, 10), (0, 0)).await.unwrap();
        for dy in 0..10u16 {
            for dx in 0..10u16 {
                assert_eq!(fb.pixel(5 + dx, 5 + dy), before.pixel(dx, dy));
            }
        }
    }

    #[tokio::test]
    async fn out_of_bounds_source_is_an_error() {
        let mut fb = gradient(16);
        assert!(run(&mut fb, rect(0, 0, 8, 8), (12, 12)).await.is_err());
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let mut fb = gradient(16);
        let mut stream = RfbInStream::new(Cursor::new(vec![0, 5]));
        let err = CopyRectDecoder
            .decode(
                &mut stream,
                &rect(0, 0, 2, 2),
                &PixelFormat::canonical(),
                &ColorMap::new(),
                &mut fb,
            )
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("CopyRect"));
    }
}
