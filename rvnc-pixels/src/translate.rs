//! Translation from wire pixels to the canonical 32-bit form.
//!
//! The steady state of a connection is the canonical format — the client
//! forces it with SetPixelFormat right after initialization — so the common
//! path is a plain little-endian load. The general path exists for the
//! window before the request takes effect and for servers that ignore it:
//! it assembles the pixel value honoring the wire byte order, extracts each
//! channel by shift and mask, and rescales it to 8 bits with rounding.

use crate::format::{ColorMap, PixelFormat};
use anyhow::{bail, Result};

/// Converts raw wire pixels into canonical `0x00RRGGBB` values.
///
/// Borrowed by decoders for the duration of one rectangle; the color map is
/// only consulted for non-true-color formats.
pub struct PixelReader<'a> {
    format: &'a PixelFormat,
    colors: &'a ColorMap,
    canonical: bool,
}

impl<'a> PixelReader<'a> {
    pub fn new(format: &'a PixelFormat, colors: &'a ColorMap) -> Self {
        Self {
            format,
            colors,
            canonical: format.is_canonical(),
        }
    }

    /// Bytes occupied by one wire pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel() as usize
    }

    /// Translate one wire pixel. `raw` must be exactly
    /// [`bytes_per_pixel`](Self::bytes_per_pixel) bytes.
    pub fn decode(&self, raw: &[u8]) -> u32 {
        if self.canonical {
            // Straight copy of the little-endian quad; the top byte is
            // padding on the wire and masked off.
            return u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) & 0x00FF_FFFF;
        }

        let value = self.assemble(raw);

        if self.format.true_color == 0 {
            return self.colors.canonical_pixel(value);
        }

        let r = rescale(
            (value >> self.format.red_shift) & self.format.red_max as u32,
            self.format.red_max,
        );
        let g = rescale(
            (value >> self.format.green_shift) & self.format.green_max as u32,
            self.format.green_max,
        );
        let b = rescale(
            (value >> self.format.blue_shift) & self.format.blue_max as u32,
            self.format.blue_max,
        );
        (r << 16) | (g << 8) | b
    }

    /// Translate a row of tightly packed wire pixels into `out`.
    ///
    /// Fails when `raw` is not a whole number of pixels.
    pub fn decode_row(&self, raw: &[u8], out: &mut Vec<u32>) -> Result<()> {
        let bpp = self.bytes_per_pixel();
        if raw.len() % bpp != 0 {
            bail!(
                "pixel row of {} bytes is not a multiple of {} bytes per pixel",
                raw.len(),
                bpp
            );
        }
        out.reserve(raw.len() / bpp);
        for chunk in raw.chunks_exact(bpp) {
            out.push(self.decode(chunk));
        }
        Ok(())
    }

    fn assemble(&self, raw: &[u8]) -> u32 {
        let mut value = 0u32;
        if self.format.big_endian != 0 {
            for &byte in raw {
                value = (value << 8) | byte as u32;
            }
        } else {
            for (i, &byte) in raw.iter().enumerate() {
                value |= (byte as u32) << (i * 8);
            }
        }
        value
    }
}

/// Rescale a channel value from `0..=max` to `0..=255`, rounding to nearest.
fn rescale(value: u32, max: u16) -> u32 {
    if max == 0 {
        return 0;
    }
    (value * 255 + max as u32 / 2) / max as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb565() -> PixelFormat {
        PixelFormat {
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
        }
    }

    #[test]
    fn canonical_pixels_pass_through() {
        let pf = PixelFormat::canonical();
        let colors = ColorMap::new();
        let reader = PixelReader::new(&pf, &colors);

        // Blue: B in the low byte, little-endian on the wire.
        assert_eq!(reader.decode(&[0xFF, 0x00, 0x00, 0x00]), 0x0000_00FF);
        // Green.
        assert_eq!(reader.decode(&[0x00, 0xFF, 0x00, 0x00]), 0x0000_FF00);
        // Wire padding byte is dropped.
        assert_eq!(reader.decode(&[0x12, 0x34, 0x56, 0x99]), 0x0056_3412);
    }

    #[test]
    fn rgb565_rescales_channels() {
        let pf = rgb565();
        let colors = ColorMap::new();
        let reader = PixelReader::new(&pf, &colors);

        // Pure red in RGB565 is 0xF800, little-endian [0x00, 0xF8].
        assert_eq!(reader.decode(&[0x00, 0xF8]), 0x00FF_0000);
        // Pure green 0x07E0.
        assert_eq!(reader.decode(&[0xE0, 0x07]), 0x0000_FF00);
        // Mid-scale red: 16/31 rounds to 132.
        assert_eq!(reader.decode(&[0x00, 0x80]), 132 << 16);
    }

    #[test]
    fn big_endian_assembly() {
        let mut pf = rgb565();
        pf.big_endian = 1;
        let colors = ColorMap::new();
        let reader = PixelReader::new(&pf, &colors);
        assert_eq!(reader.decode(&[0xF8, 0x00]), 0x00FF_0000);
    }

    #[test]
    fn indexed_pixels_go_through_the_colormap() {
        let pf = PixelFormat {
            bits_per_pixel: 8,
            depth: 8,
            big_endian: 0,
            true_color: 0,
            red_max: 0,
            green_max: 0,
            blue_max: 0,
            red_shift: 0,
            green_shift: 0,
            blue_shift: 0,
        };
        let mut colors = ColorMap::new();
        colors.set_entries(7, &[(0x1200, 0x3400, 0x5600)]);
        let reader = PixelReader::new(&pf, &colors);
        assert_eq!(reader.decode(&[7]), 0x0012_3456);
    }

    #[test]
    fn decode_row_rejects_ragged_input() {
        let pf = PixelFormat::canonical();
        let colors = ColorMap::new();
        let reader = PixelReader::new(&pf, &colors);
        let mut out = Vec::new();
        assert!(reader.decode_row(&[0, 1, 2], &mut out).is_err());

        out.clear();
        reader
            .decode_row(&[0xFF, 0, 0, 0, 0, 0xFF, 0, 0], &mut out)
            .unwrap();
        assert_eq!(out, vec![0x0000_00FF, 0x0000_FF00]);
    }
}
