//! The per-connection zlib inflate context.
//!
//! Both the Zlib and ZRLE encodings transmit their payloads as slices of a
//! single continuous zlib stream: only the first slice carries the zlib
//! header, and every later rectangle — regardless of which of the two
//! encodings it uses — is a raw deflate continuation. The inflater state
//! therefore lives for the whole connection and must never be reset while
//! rectangles are still arriving.

use anyhow::{Context, Result};
use flate2::{Decompress, FlushDecompress, Status};
use std::sync::{Arc, Mutex};

/// Handle through which the Zlib and ZRLE decoders share one inflate
/// context.
pub type SharedZlibStream = Arc<Mutex<ZlibStream>>;

/// A persistent zlib inflate stream.
pub struct ZlibStream {
    inflater: Decompress,
}

impl Default for ZlibStream {
    fn default() -> Self {
        Self::new()
    }
}

impl ZlibStream {
    /// Create a fresh stream expecting a zlib header on the first input.
    pub fn new() -> Self {
        Self {
            inflater: Decompress::new(true),
        }
    }

    /// Wrap a fresh stream in the shared handle decoders are built from.
    pub fn shared() -> SharedZlibStream {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Inflate one compressed slice, carrying state over from previous
    /// calls. Returns all bytes produced for this input.
    pub fn inflate(&mut self, compressed: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut out_buf = vec![0u8; 64 * 1024];
        let mut in_pos = 0usize;

        while in_pos < compressed.len() {
            let before_in = self.inflater.total_in();
            let before_out = self.inflater.total_out();

            let status = self
                .inflater
                .decompress(&compressed[in_pos..], &mut out_buf, FlushDecompress::Sync)
                .with_context(|| {
                    format!(
                        "zlib inflate failed at offset {} of {} input bytes",
                        in_pos,
                        compressed.len()
                    )
                })?;

            let consumed = (self.inflater.total_in() - before_in) as usize;
            let produced = (self.inflater.total_out() - before_out) as usize;
            in_pos += consumed;
            output.extend_from_slice(&out_buf[..produced]);

            match status {
                Status::Ok | Status::BufError => continue,
                Status::StreamEnd => {
                    // A server never finalizes this stream mid-connection;
                    // stop consuming rather than loop forever if one does.
                    tracing::warn!(
                        "zlib stream ended early, consumed {}/{} bytes",
                        in_pos,
                        compressed.len()
                    );
                    break;
                }
            }
        }

        Ok(output)
    }
}
