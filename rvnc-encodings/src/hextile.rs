//! Hextile encoding (type 5): 16x16 tiles with per-tile subencodings.
//!
//! The rectangle is walked in 16x16 tiles, row-major, with edge tiles
//! clipped to the remaining width and height. Each tile opens with a mask
//! byte:
//!
//! ```text
//! bit 0  Raw                  tile is raw pixels; all other bits ignored
//! bit 1  BackgroundSpecified  a new background pixel follows
//! bit 2  ForegroundSpecified  a new foreground pixel follows
//! bit 3  AnySubrects          a u8 subrect count follows
//! bit 4  SubrectsColoured     each subrect carries its own pixel
//! ```
//!
//! Each subrect is `[pixel if coloured]`, a packed XY byte (high nibble x,
//! low nibble y) and a packed WH byte (high nibble w-1, low nibble h-1).
//! Background and foreground persist from tile to tile within a single
//! rectangle, so a run of tiles sharing colors costs one byte each.

use crate::{read_pixel, Decoder, ENCODING_HEXTILE};
use anyhow::{anyhow, bail, Context, Result};
use rvnc_pixels::{ColorMap, Framebuffer, PixelFormat, PixelReader};
use rvnc_wire::io::RfbInStream;
use rvnc_wire::messages::Rectangle;
use tokio::io::AsyncRead;

const RAW: u8 = 1 << 0;
const BACKGROUND_SPECIFIED: u8 = 1 << 1;
const FOREGROUND_SPECIFIED: u8 = 1 << 2;
const ANY_SUBRECTS: u8 = 1 << 3;
const SUBRECTS_COLOURED: u8 = 1 << 4;

/// Tiles are 16x16, clipped at the right and bottom edges.
const TILE_SIZE: u16 = 16;

/// Decoder for Hextile rectangles.
pub struct HextileDecoder;

impl Decoder for HextileDecoder {
    fn encoding(&self) -> i32 {
        ENCODING_HEXTILE
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

        // Colors persist across tiles within this rectangle only.
        let mut background: Option<u32> = None;
        let mut foreground: Option<u32> = None;

        let mut ty = 0u16;
        while ty < rect.height {
            let tile_h = TILE_SIZE.min(rect.height - ty);
            let mut tx = 0u16;
            while tx < rect.width {
                let tile_w = TILE_SIZE.min(rect.width - tx);
                let abs_x = rect.x + tx;
                let abs_y = rect.y + ty;

                let mask = stream.read_u8().await.with_context(|| {
                    format!("failed to read Hextile tile mask at tile ({tx}, {ty})")
                })?;

                if mask & RAW != 0 {
                    decode_raw_tile(stream, &reader, framebuffer, abs_x, abs_y, tile_w, tile_h)
                        .await
                        .with_context(|| format!("raw Hextile tile at ({tx}, {ty})"))?;
                    tx += TILE_SIZE;
                    continue;
                }

                if mask & BACKGROUND_SPECIFIED != 0 {
                    background = Some(read_pixel(stream, &reader).await.with_context(|| {
                        format!("failed to read Hextile background at tile ({tx}, {ty})")
                    })?);
                }
                let bg = background.ok_or_else(|| {
                    anyhow!("Hextile tile at ({tx}, {ty}) uses a background that was never sent")
                })?;

                framebuffer
                    .fill_rect(abs_x, abs_y, tile_w, tile_h, bg)
                    .with_context(|| format!("Hextile tile at ({tx}, {ty}) is out of bounds"))?;

                if mask & FOREGROUND_SPECIFIED != 0 {
                    foreground = Some(read_pixel(stream, &reader).await.with_context(|| {
                        format!("failed to read Hextile foreground at tile ({tx}, {ty})")
                    })?);
                }

                if mask & ANY_SUBRECTS != 0 {
                    let count = stream.read_u8().await.with_context(|| {
                        format!("failed to read Hextile subrect count at tile ({tx}, {ty})")
                    })?;
                    let coloured = mask & SUBRECTS_COLOURED != 0;

                    for i in 0..count {
                        let color = if coloured {
                            read_pixel(stream, &reader).await.with_context(|| {
                                format!("failed to read subrect {i} pixel at tile ({tx}, {ty})")
                            })?
                        } else {
                            foreground.ok_or_else(|| {
                                anyhow!(
                                    "Hextile tile at ({tx}, {ty}) has plain subrects \
                                     but no foreground"
                                )
                            })?
                        };

                        let xy = stream.read_u8().await?;
                        let wh = stream.read_u8().await?;
                        let sx = (xy >> 4) as u16;
                        let sy = (xy & 0x0F) as u16;
                        let sw = ((wh >> 4) & 0x0F) as u16 + 1;
                        let sh = (wh & 0x0F) as u16 + 1;

                        if sx + sw > tile_w || sy + sh > tile_h {
                            bail!(
                                "Hextile subrect {i} ({sw}x{sh} at {sx},{sy}) leaves the \
                                 {tile_w}x{tile_h} tile at ({tx}, {ty})"
                            );
                        }

                        framebuffer
                            .fill_rect(abs_x + sx, abs_y + sy, sw, sh, color)
                            .with_context(|| {
                                format!("failed to fill subrect {i} at tile ({tx}, {ty})")
                            })?;
                    }
                }

                tx += TILE_SIZE;
            }
            ty += TILE_SIZE;
        }

        Ok(())
    }
}

async fn decode_raw_tile<R: AsyncRead + Unpin>(
    stream: &mut RfbInStream<R>,
    reader: &PixelReader<'_>,
    framebuffer: &mut Framebuffer,
    abs_x: u16,
    abs_y: u16,
    tile_w: u16,
    tile_h: u16,
) -> Result<()> {
    let row_bytes = tile_w as usize * reader.bytes_per_pixel();
    let mut data = vec![0u8; row_bytes * tile_h as usize];
    stream
        .read_bytes(&mut data)
        .await
        .context("failed to read raw tile pixels")?;

    let mut row = Vec::with_capacity(tile_w as usize);
    for y in 0..tile_h {
        row.clear();
        let start = y as usize * row_bytes;
        reader.decode_row(&data[start..start + row_bytes], &mut row)?;
        framebuffer.write_row(abs_x, abs_y + y, &row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn rect(w: u16, h: u16) -> Rectangle {
        Rectangle {
            x: 0,
            y: 0,
            width: w,
            height: h,
            encoding: ENCODING_HEXTILE,
        }
    }

    fn px(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    async fn decode(body: Vec<u8>, rect: &Rectangle, fb: &mut Framebuffer) -> Result<()> {
        let mut stream = RfbInStream::new(Cursor::new(body));
        HextileDecoder
            .decode(
                &mut stream,
                rect,
                &PixelFormat::canonical(),
                &ColorMap::new(),
                fb,
            )
            .await
    }

    #[tokio::test]
    async fn background_only_tile_fills() {
        let mut body = vec![BACKGROUND_SPECIFIED];
        body.extend_from_slice(&px(0x0000_00FF));

        let mut fb = Framebuffer::new(8, 8, "");
        decode(body, &rect(4, 4), &mut fb).await.unwrap();
        assert_eq!(fb.pixel(0, 0), Some(0x0000_00FF));
        assert_eq!(fb.pixel(3, 3), Some(0x0000_00FF));
        assert_eq!(fb.pixel(4, 0), Some(0));
    }

    #[tokio::test]
    async fn background_persists_across_tiles() {
        // 17x1 rectangle is two tiles; the second reuses the first's color.
        let mut body = vec![BACKGROUND_SPECIFIED];
        body.extend_from_slice(&px(0x0012_3456));
        body.push(0); // second tile: empty mask
        let mut fb = Framebuffer::new(20, 4, "");
        decode(body, &rect(17, 1), &mut fb).await.unwrap();
        assert_eq!(fb.pixel(16, 0), Some(0x0012_3456));
    }

    #[tokio::test]
    async fn missing_background_is_an_error() {
        let body = vec![0u8]; // empty mask, no background ever set
        let mut fb = Framebuffer::new(8, 8, "");
        let err = decode(body, &rect(4, 4), &mut fb).await.unwrap_err();
        assert!(err.to_string().contains("never sent"));
    }

    #[tokio::test]
    async fn plain_subrects_use_the_foreground() {
        let mut body = vec![BACKGROUND_SPECIFIED | FOREGROUND_SPECIFIED | ANY_SUBRECTS];
        body.extend_from_slice(&px(0)); // background black
        body.extend_from_slice(&px(0x00FF_FFFF)); // foreground white
        body.push(1); // one subrect
        body.push(0x22); // x=2, y=2
        body.push(0x21); // w=3, h=2

        let mut fb = Framebuffer::new(10, 10, "");
        decode(body, &rect(8, 8), &mut fb).await.unwrap();
        assert_eq!(fb.pixel(2, 2), Some(0x00FF_FFFF));
        assert_eq!(fb.pixel(4, 3), Some(0x00FF_FFFF));
        assert_eq!(fb.pixel(5, 3), Some(0)); // past the subrect
        assert_eq!(fb.pixel(2, 4), Some(0));
    }

    #[tokio::test]
    async fn every_uncovered_pixel_is_background() {
        let mut body = vec![BACKGROUND_SPECIFIED | FOREGROUND_SPECIFIED | ANY_SUBRECTS];
        body.extend_from_slice(&px(0x0000_0011));
        body.extend_from_slice(&px(0x00EE_0000));
        body.push(1);
        body.push(0x00); // at (0,0)
        body.push(0x00); // 1x1

        let mut fb = Framebuffer::new(8, 8, "");
        decode(body, &rect(5, 5), &mut fb).await.unwrap();
        for y in 0..5u16 {
            for x in 0..5u16 {
                let expected = if (x, y) == (0, 0) { 0x00EE_0000 } else { 0x0000_0011 };
                assert_eq!(fb.pixel(x, y), Some(expected), "at ({x}, {y})");
            }
        }
    }

    #[tokio::test]
    async fn coloured_subrects_carry_their_own_pixel() {
        let mut body = vec![BACKGROUND_SPECIFIED | ANY_SUBRECTS | SUBRECTS_COLOURED];
        body.extend_from_slice(&px(0x0000_0000));
        body.push(2);
        body.extend_from_slice(&px(0x00FF_0000));
        body.push(0x00);
        body.push(0x00);
        body.extend_from_slice(&px(0x0000_FF00));
        body.push(0x11);
        body.push(0x00);

        let mut fb = Framebuffer::new(8, 8, "");
        decode(body, &rect(4, 4), &mut fb).await.unwrap();
        assert_eq!(fb.pixel(0, 0), Some(0x00FF_0000));
        assert_eq!(fb.pixel(1, 1), Some(0x0000_FF00));
    }

    #[tokio::test]
    async fn plain_subrects_without_foreground_are_an_error() {
        let mut body = vec![BACKGROUND_SPECIFIED | ANY_SUBRECTS];
        body.extend_from_slice(&px(0));
        body.push(1);
        let mut fb = Framebuffer::new(8, 8, "");
        let err = decode(body, &rect(4, 4), &mut fb).await.unwrap_err();
        assert!(err.to_string().contains("no foreground"));
    }

    #[tokio::test]
    async fn subrect_leaving_the_tile_is_an_error() {
        let mut body = vec![BACKGROUND_SPECIFIED | FOREGROUND_SPECIFIED | ANY_SUBRECTS];
        body.extend_from_slice(&px(0));
        body.extend_from_slice(&px(1));
        body.push(1);
        body.push(0x30); // x=3
        body.push(0x20); // w=3 -> exceeds the 4-wide tile
        let mut fb = Framebuffer::new(8, 8, "");
        let err = decode(body, &rect(4, 4), &mut fb).await.unwrap_err();
        assert!(err.to_string().contains("leaves"));
    }

    #[tokio::test]
    async fn raw_tile_reads_pixels_and_ignores_other_bits() {
        let mut body = vec![RAW | BACKGROUND_SPECIFIED];
        for v in [1u32, 2, 3, 4] {
            body.extend_from_slice(&px(v));
        }
        let mut fb = Framebuffer::new(8, 8, "");
        decode(body, &rect(2, 2), &mut fb).await.unwrap();
        assert_eq!(fb.pixel(0, 0), Some(1));
        assert_eq!(fb.pixel(1, 0), Some(2));
        assert_eq!(fb.pixel(0, 1), Some(3));
        assert_eq!(fb.pixel(1, 1), Some(4));
    }

    #[tokio::test]
    async fn edge_tiles_are_clipped() {
        // 17x17: four tiles of 16x16, 1x16, 16x1, 1x1.
        let mut body = Vec::new();
        for color in [0x10u32, 0x20, 0x30, 0x40] {
            body.push(BACKGROUND_SPECIFIED);
            body.extend_from_slice(&px(color));
        }
        let mut fb = Framebuffer::new(20, 20, "");
        decode(body, &rect(17, 17), &mut fb).await.unwrap();
        assert_eq!(fb.pixel(0, 0), Some(0x10));
        assert_eq!(fb.pixel(16, 0), Some(0x20));
        assert_eq!(fb.pixel(0, 16), Some(0x30));
        assert_eq!(fb.pixel(16, 16), Some(0x40));
    }

    #[tokio::test]
    async fn subrect_at_the_tile_corner_is_valid() {
        let mut body = vec![BACKGROUND_SPECIFIED | FOREGROUND_SPECIFIED | ANY_SUBRECTS];
        body.extend_from_slice(&px(0));
        body.extend_from_slice(&px(0x0055_5555));
        body.push(1);
        body.push(0xFF); // x=15, y=15
        body.push(0x00); // 1x1
        let mut fb = Framebuffer::new(16, 16, "");
        decode(body, &rect(16, 16), &mut fb).await.unwrap();
        assert_eq!(fb.pixel(15, 15), Some(0x0055_5555));
    }

    #[tokio::test]
    async fn truncated_tile_mask_is_an_error() {
        let mut fb = Framebuffer::new(8, 8, "");
        let err = decode(Vec::new(), &rect(4, 4), &mut fb).await.unwrap_err();
        assert!(format!("{err:#}").contains("tile mask"));
    }
}
