//! RRE encoding (type 2): rise-and-run-length rectangles.
//!
//! # Wire Format
//!
//! ```text
//! +------------------+
//! | num_subrects     |  u32
//! | background pixel |  bytes_per_pixel
//! +------------------+
//! | per subrect:     |
//! |   pixel          |  bytes_per_pixel
//! |   x, y, w, h     |  u16 each, relative to the rectangle
//! +------------------+
//! ```
//!
//! The whole rectangle is filled with the background first, then each
//! subrectangle is painted over it. Subrectangle coordinates are relative
//! to the enclosing rectangle and must stay inside it.

use crate::{read_pixel, Decoder, ENCODING_RRE};
use anyhow::{bail, Context, Result};
use rvnc_pixels::{ColorMap, Framebuffer, PixelFormat, PixelReader};
use rvnc_wire::io::RfbInStream;
use rvnc_wire::messages::Rectangle;
use tokio::io::AsyncRead;

/// Decoder for RRE rectangles.
pub struct RreDecoder;

impl Decoder for RreDecoder {
    fn encoding(&self) -> i32 {
        ENCODING_RRE
    }

    async fn decode<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        format: &PixelFormat,
        colors: &ColorMap,
        framebuffer: &mut Framebuffer,
    ) -> Result<()> {
        let reader = PixelReader::new(format, colors);

        let count = stream
            .read_u32()
            .await
            .context("failed to read RRE subrect count")?;
        let background = read_pixel(stream, &reader)
            .await
            .context("failed to read RRE background pixel")?;

        framebuffer
            .fill_rect(rect.x, rect.y, rect.width, rect.height, background)
            .context("RRE rectangle is out of bounds")?;

        for i in 0..count {
            let pixel = read_pixel(stream, &reader)
                .await
                .with_context(|| format!("failed to read pixel for RRE subrect {i}"))?;
            let sx = stream.read_u16().await?;
            let sy = stream.read_u16().await?;
            let sw = stream.read_u16().await?;
            let sh = stream.read_u16().await?;

            if sx as u32 + sw as u32 > rect.width as u32
                || sy as u32 + sh as u32 > rect.height as u32
            {
                bail!(
                    "RRE subrect {} ({}x{} at {},{}) leaves the {}x{} rectangle",
                    i,
                    sw,
                    sh,
                    sx,
                    sy,
                    rect.width,
                    rect.height
                );
            }

            framebuffer
                .fill_rect(rect.x + sx, rect.y + sy, sw, sh, pixel)
                .with_context(|| format!("failed to fill RRE subrect {i}"))?;
        }

        Ok(())
    }
}
