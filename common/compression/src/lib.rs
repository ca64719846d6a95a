//! Body compression for outgoing event batches.
use std::io::prelude::*;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Maps a serialized body to its compressed form. The name is sent as the
/// `Content-Encoding` of the request.
pub trait Compressor {
    fn encoding(&self) -> &'static str;
    fn compress(&self, bytes: &[u8]) -> std::io::Result<Vec<u8>>;
}

#[derive(Clone, Copy, Debug)]
pub struct GzipCompressor {
    level: Compression,
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Compressor for GzipCompressor {
    fn encoding(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, bytes: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), self.level);
        encoder.write_all(bytes)?;
        encoder.finish()
    }
}

/// Inverse of [`GzipCompressor::compress`], mostly useful to inspect captured bodies.
pub fn gunzip(bytes: &[u8]) -> std::io::Result<String> {
    let mut decoder = GzDecoder::new(bytes);
    let mut s = String::new();
    decoder.read_to_string(&mut s)?;
    Ok(s)
}
