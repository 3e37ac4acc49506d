//! Framebuffer rectangle decoders.
//!
//! One decoder per RFB encoding. A decoder reads exactly the bytes its
//! encoding defines for one rectangle from the input stream, translates
//! pixels through the [`PixelReader`], and writes canonical values into the
//! [`Framebuffer`]. Decoders fail fast with a descriptive error; the session
//! treats any failure as fatal for the connection.
//!
//! The Zlib and ZRLE encodings share one [`ZlibStream`] per connection —
//! the compressed data forms a single deflate stream across all rectangles
//! of both encodings, so the two decoders are constructed from the same
//! [`SharedZlibStream`] handle and resetting it mid-connection would corrupt
//! every subsequent rectangle.

use anyhow::Result;
use rvnc_pixels::{ColorMap, Framebuffer, PixelFormat, PixelReader};
use rvnc_wire::io::RfbInStream;
use rvnc_wire::messages::Rectangle;
use tokio::io::AsyncRead;

pub mod copyrect;
pub mod hextile;
pub mod raw;
pub mod rre;
pub mod zlib;
pub mod zlib_stream;
pub mod zrle;

pub use copyrect::CopyRectDecoder;
pub use hextile::HextileDecoder;
pub use raw::RawDecoder;
pub use rre::RreDecoder;
pub use zlib::ZlibDecoder;
pub use zlib_stream::{SharedZlibStream, ZlibStream};
pub use zrle::ZrleDecoder;

/// Raw encoding: uncompressed wire pixels.
pub const ENCODING_RAW: i32 = 0;

/// CopyRect encoding: copy a block from elsewhere in the framebuffer.
pub const ENCODING_COPY_RECT: i32 = 1;

/// RRE encoding: background color plus solid subrectangles.
pub const ENCODING_RRE: i32 = 2;

/// Hextile encoding: 16x16 tiles with per-tile subencodings.
pub const ENCODING_HEXTILE: i32 = 5;

/// Zlib encoding: a zlib-compressed Raw rectangle.
pub const ENCODING_ZLIB: i32 = 6;

/// ZRLE encoding: zlib-compressed run-length data in 64x64 tiles.
pub const ENCODING_ZRLE: i32 = 16;

/// Upper bound on one rectangle's compressed payload. A length prefix
/// beyond this is corrupt framing, not an allocation request.
pub(crate) const MAX_COMPRESSED_LEN: usize = 1 << 26;

/// A single-rectangle decoder for one RFB encoding.
///
/// Implementors must consume exactly the rectangle's wire bytes and must
/// not write outside the rectangle's bounds.
#[allow(async_fn_in_trait)]
pub trait Decoder {
    /// The encoding tag this decoder handles.
    fn encoding(&self) -> i32;

    /// Decode one rectangle from `stream` into `framebuffer`.
    async fn decode<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        format: &PixelFormat,
        colors: &ColorMap,
        framebuffer: &mut Framebuffer,
    ) -> Result<()>;
}

/// Read one wire pixel from the stream and translate it.
pub(crate) async fn read_pixel<R: AsyncRead + Unpin>(
    stream: &mut RfbInStream<R>,
    reader: &PixelReader<'_>,
) -> Result<u32> {
    let mut raw = [0u8; 4];
    let bpp = reader.bytes_per_pixel();
    stream.read_bytes(&mut raw[..bpp]).await?;
    Ok(reader.decode(&raw[..bpp]))
}
