//! Decoder registry: encoding tag to decoder dispatch.
//!
//! The `Decoder` trait has a generic async method, so it is not object
//! safe; dispatch goes through an enum instead of `dyn`. The registry also
//! owns the wiring that matters for correctness: the Zlib and ZRLE
//! decoders are constructed from one shared inflate stream, created once
//! per registry (one registry per connection).

use anyhow::Result;
use rvnc_encodings::{
    CopyRectDecoder, Decoder, HextileDecoder, RawDecoder, RreDecoder, ZlibDecoder, ZlibStream,
    ZrleDecoder,
};
use rvnc_pixels::{ColorMap, Framebuffer, PixelFormat};
use rvnc_wire::io::RfbInStream;
use rvnc_wire::messages::Rectangle;
use std::collections::HashMap;
use tokio::io::AsyncRead;

/// One decoder per supported encoding tag.
pub struct DecoderRegistry {
    decoders: HashMap<i32, DecoderEntry>,
}

impl DecoderRegistry {
    /// Registry with every encoding this client supports, sharing one
    /// zlib stream between Zlib and ZRLE.
    pub fn standard() -> Self {
        let zlib_stream = ZlibStream::shared();
        let mut decoders = HashMap::new();
        for entry in [
            DecoderEntry::Raw(RawDecoder),
            DecoderEntry::CopyRect(CopyRectDecoder),
            DecoderEntry::Rre(RreDecoder),
            DecoderEntry::Hextile(HextileDecoder),
            DecoderEntry::Zlib(ZlibDecoder::new(zlib_stream.clone())),
            DecoderEntry::Zrle(ZrleDecoder::new(zlib_stream)),
        ] {
            decoders.insert(entry.encoding(), entry);
        }
        Self { decoders }
    }

    /// Look up the decoder for an encoding tag.
    pub fn get(&self, encoding: i32) -> Option<&DecoderEntry> {
        self.decoders.get(&encoding)
    }
}

/// Concrete dispatch over the non-object-safe `Decoder` trait.
pub enum DecoderEntry {
    Raw(RawDecoder),
    CopyRect(CopyRectDecoder),
    Rre(RreDecoder),
    Hextile(HextileDecoder),
    Zlib(ZlibDecoder),
    Zrle(ZrleDecoder),
}

impl DecoderEntry {
    fn encoding(&self) -> i32 {
        match self {
            Self::Raw(d) => d.encoding(),
            Self::CopyRect(d) => d.encoding(),
            Self::Rre(d) => d.encoding(),
            Self::Hextile(d) => d.encoding(),
            Self::Zlib(d) => d.encoding(),
            Self::Zrle(d) => d.encoding(),
        }
    }

    pub async fn decode<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        format: &PixelFormat,
        colors: &ColorMap,
        framebuffer: &mut Framebuffer,
    ) -> Result<()> {
        match self {
            Self::Raw(d) => d.decode(stream, rect, format, colors, framebuffer).await,
            Self::CopyRect(d) => d.decode(stream, rect, format, colors, framebuffer).await,
            Self::Rre(d) => d.decode(stream, rect, format, colors, framebuffer).await,
            Self::Hextile(d) => d.decode(stream, rect, format, colors, framebuffer).await,
            Self::Zlib(d) => d.decode(stream, rect, format, colors, framebuffer).await,
            Self::Zrle(d) => d.decode(stream, rect, format, colors, framebuffer).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvnc_encodings as enc;

    #[test]
    fn standard_registry_covers_every_supported_tag() {
        let registry = DecoderRegistry::standard();
        for tag in [
            enc::ENCODING_RAW,
            enc::ENCODING_COPY_RECT,
            enc::ENCODING_RRE,
            enc::ENCODING_HEXTILE,
            enc::ENCODING_ZLIB,
            enc::ENCODING_ZRLE,
        ] {
            assert!(registry.get(tag).is_some(), "missing decoder for {tag}");
        }
        assert!(registry.get(7).is_none());
        assert!(registry.get(-1).is_none());
    }
}
