//! ZRLE encoding (type 16): zlib-compressed run-length data in 64x64 tiles.
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
//! stream (shared with the Zlib encoding). The decompressed payload is a
//! sequence of tiles in row-major order, each opening with a subencoding
//! byte:
//!
//! ```text
//! 0          raw CPIXELs, w*h of them
//! 1          one CPIXEL, solid tile
//! 2..=16     packed palette: n CPIXELs, then 1/2/4-bit indices,
//!            MSB-first, each row starting on a byte boundary
//! 17..=127   unused (protocol error)
//! 128        plain RLE: {CPIXEL, run length} until the tile is full
//! 129        unused (protocol error)
//! 130..=255  palette RLE with n = subencoding - 128 palette entries;
//!            an index byte with the top bit set is followed by a run
//!            length, otherwise it stands for a single pixel
//! ```
//!
//! Run lengths are `1 +` the sum of length bytes, where a byte of 255 means
//! another byte follows.
//!
//! A CPIXEL is a pixel with the padding byte dropped: 3 bytes, in the pixel
//! format's byte order, whenever the format is true color with bpp 32,
//! depth at most 24 and every color bit inside the low three bytes.
//! Otherwise a CPIXEL is just a wire pixel.

use crate::zlib_stream::SharedZlibStream;
use crate::{Decoder, ENCODING_ZRLE, MAX_COMPRESSED_LEN};
use anyhow::{anyhow, bail, Context, Result};
use rvnc_pixels::{ColorMap, Framebuffer, PixelFormat, PixelReader};
use rvnc_wire::io::RfbInStream;
use rvnc_wire::messages::Rectangle;
use tokio::io::AsyncRead;

/// ZRLE tiles are 64x64, clipped at the right and bottom edges.
const TILE_SIZE: u16 = 64;

/// Decoder for ZRLE rectangles.
pub struct ZrleDecoder {
    stream: SharedZlibStream,
}

impl ZrleDecoder {
    /// Build a decoder over the connection's shared inflate stream.
    pub fn new(stream: SharedZlibStream) -> Self {
        Self { stream }
    }
}

impl Decoder for ZrleDecoder {
    fn encoding(&self) -> i32 {
        ENCODING_ZRLE
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
            .context("failed to read ZRLE data length")?;
        let compressed = stream
            .read_sized(length as usize, MAX_COMPRESSED_LEN)
            .await
            .context("failed to read ZRLE compressed data")?;

        let data = self
            .stream
            .lock()
            .expect("zlib stream lock poisoned")
            .inflate(&compressed)
            .context("ZRLE rectangle failed to inflate")?;

        tracing::trace!(
            "ZRLE rect {}x{} at ({}, {}): {} -> {} bytes",
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            compressed.len(),
            data.len()
        );

        let reader = PixelReader::new(format, colors);
        let cpixel = cpixel_len(format);
        let mut cursor = TileCursor::new(&data);

        let mut ty = 0u16;
        while ty < rect.height {
            let tile_h = TILE_SIZE.min(rect.height - ty);
            let mut tx = 0u16;
            while tx < rect.width {
                let tile_w = TILE_SIZE.min(rect.width - tx);
                decode_tile(
                    &mut cursor,
                    format,
                    &reader,
                    cpixel,
                    framebuffer,
                    rect.x + tx,
                    rect.y + ty,
                    tile_w,
                    tile_h,
                )
                .with_context(|| format!("ZRLE tile at ({tx}, {ty})"))?;
                tx += TILE_SIZE;
            }
            ty += TILE_SIZE;
        }

        if cursor.remaining() > 0 {
            bail!(
                "{} trailing bytes after the last ZRLE tile",
                cursor.remaining()
            );
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_tile(
    cursor: &mut TileCursor<'_>,
    format: &PixelFormat,
    reader: &PixelReader<'_>,
    cpixel: usize,
    framebuffer: &mut Framebuffer,
    x: u16,
    y: u16,
    tile_w: u16,
    tile_h: u16,
) -> Result<()> {
    let area = tile_w as usize * tile_h as usize;
    let subencoding = cursor.read_u8().context("failed to read subencoding")?;

    let pixels = match subencoding {
        0 => {
            let mut pixels = Vec::with_capacity(area);
            for _ in 0..area {
                pixels.push(read_cpixel(cursor, format, reader, cpixel)?);
            }
            pixels
        }
        1 => {
            let color = read_cpixel(cursor, format, reader, cpixel)?;
            framebuffer.fill_rect(x, y, tile_w, tile_h, color)?;
            return Ok(());
        }
        2..=16 => {
            let palette = read_palette(cursor, format, reader, cpixel, subencoding as usize)?;
            unpack_indices(cursor, &palette, tile_w, tile_h)?
        }
        128 => {
            let mut pixels = Vec::with_capacity(area);
            while pixels.len() < area {
                let color = read_cpixel(cursor, format, reader, cpixel)?;
                let run = read_run_length(cursor)?;
                if pixels.len() + run > area {
                    bail!(
                        "RLE run of {} exceeds the {} remaining tile pixels",
                        run,
                        area - pixels.len()
                    );
                }
                pixels.extend(std::iter::repeat(color).take(run));
            }
            pixels
        }
        130..=255 => {
            let palette =
                read_palette(cursor, format, reader, cpixel, (subencoding - 128) as usize)?;
            let mut pixels = Vec::with_capacity(area);
            while pixels.len() < area {
                let code = cursor.read_u8().context("failed to read palette RLE code")?;
                let index = (code & 0x7F) as usize;
                let run = if code & 0x80 != 0 {
                    read_run_length(cursor)?
                } else {
                    1
                };
                let color = *palette
                    .get(index)
                    .ok_or_else(|| anyhow!("palette RLE index {} out of range", index))?;
                if pixels.len() + run > area {
                    bail!(
                        "palette RLE run of {} exceeds the {} remaining tile pixels",
                        run,
                        area - pixels.len()
                    );
                }
                pixels.extend(std::iter::repeat(color).take(run));
            }
            pixels
        }
        other => bail!("invalid ZRLE subencoding {}", other),
    };

    for row in 0..tile_h {
        let start = row as usize * tile_w as usize;
        framebuffer.write_row(x, y + row, &pixels[start..start + tile_w as usize])?;
    }
    Ok(())
}

/// CPIXEL width for this format: 3 when the padding byte can be dropped,
/// otherwise the full pixel.
fn cpixel_len(format: &PixelFormat) -> usize {
    if format.true_color == 1 && format.bits_per_pixel == 32 && format.depth <= 24 {
        let max_pixel = ((format.red_max as u32) << format.red_shift)
            | ((format.green_max as u32) << format.green_shift)
            | ((format.blue_max as u32) << format.blue_shift);
        if max_pixel < (1 << 24) {
            return 3;
        }
    }
    format.bytes_per_pixel() as usize
}

fn read_cpixel(
    cursor: &mut TileCursor<'_>,
    format: &PixelFormat,
    reader: &PixelReader<'_>,
    cpixel: usize,
) -> Result<u32> {
    let raw = cursor.read_exact(cpixel).context("failed to read CPIXEL")?;
    if cpixel == 3 {
        // Re-inflate to a full pixel in the format's byte order.
        let full = if format.big_endian != 0 {
            [0, raw[0], raw[1], raw[2]]
        } else {
            [raw[0], raw[1], raw[2], 0]
        };
        Ok(reader.decode(&full))
    } else {
        Ok(reader.decode(raw))
    }
}

fn read_palette(
    cursor: &mut TileCursor<'_>,
    format: &PixelFormat,
    reader: &PixelReader<'_>,
    cpixel: usize,
    size: usize,
) -> Result<Vec<u32>> {
    let mut palette = Vec::with_capacity(size);
    for _ in 0..size {
        palette.push(read_cpixel(cursor, format, reader, cpixel)?);
    }
    Ok(palette)
}

/// Run length is 1 plus the sum of length bytes; 255 continues.
fn read_run_length(cursor: &mut TileCursor<'_>) -> Result<usize> {
    let mut length = 1usize;
    loop {
        let byte = cursor.read_u8().context("failed to read run length")?;
        length = length
            .checked_add(byte as usize)
            .ok_or_else(|| anyhow!("run length overflow"))?;
        if byte != 255 {
            return Ok(length);
        }
    }
}

/// Unpack the packed-palette index bitstring: indices are MSB-first and
/// every row starts on a byte boundary.
fn unpack_indices(
    cursor: &mut TileCursor<'_>,
    palette: &[u32],
    tile_w: u16,
    tile_h: u16,
) -> Result<Vec<u32>> {
    let bits = match palette.len() {
        0..=2 => 1,
        3..=4 => 2,
        _ => 4,
    };
    let row_bytes = (tile_w as usize * bits).div_ceil(8);

    let mut pixels = Vec::with_capacity(tile_w as usize * tile_h as usize);
    for _ in 0..tile_h {
        let packed = cursor
            .read_exact(row_bytes)
            .context("failed to read packed palette row")?;
        let mut bit = 0usize;
        for _ in 0..tile_w {
            let byte = packed[bit / 8];
            let shift = 8 - bits - (bit % 8);
            let index = ((byte >> shift) & ((1 << bits) - 1)) as usize;
            let color = *palette
                .get(index)
                .ok_or_else(|| anyhow!("packed palette index {} out of range", index))?;
            pixels.push(color);
            bit += bits;
        }
    }
    Ok(pixels)
}

/// Byte cursor over the decompressed tile data.
struct TileCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TileCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Result<u8> {
        if self.pos >= self.data.len() {
            bail!("tile data ended early: need 1 byte");
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    fn read_exact(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.pos + count > self.data.len() {
            bail!(
                "tile data ended early: need {} bytes, have {}",
                count,
                self.remaining()
            );
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }
}
