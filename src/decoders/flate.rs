//! FlateDecode (zlib/deflate).
//!
//! Decoding walks a chain of progressively more forgiving decoders, since
//! cross-reference streams from broken writers often carry damaged zlib
//! headers or trailing garbage.

use std::io::{Read, Write};

use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use inflate::inflate_bytes_zlib;
use libflate::zlib::Decoder as LibflateDecoder;

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// FlateDecode filter implementation.
pub struct FlateDecoder;

/// Read a decoder to the end, keeping whatever came out before an error.
fn drain<R: Read>(mut reader: R, label: &str) -> Option<Vec<u8>> {
    let mut output = Vec::new();
    match reader.read_to_end(&mut output) {
        Ok(_) => Some(output),
        Err(e) if !output.is_empty() => {
            log::warn!("{} partial recovery: {} bytes before error: {}", label, output.len(), e);
            Some(output)
        },
        Err(e) => {
            log::debug!("{} failed: {}", label, e);
            None
        },
    }
}

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        if let Some(out) = drain(ZlibDecoder::new(input), "zlib") {
            return Ok(out);
        }

        // Raw deflate, no zlib wrapper
        if let Some(out) = drain(DeflateDecoder::new(input), "raw deflate") {
            return Ok(out);
        }

        // Corrupt two-byte zlib header
        if input.len() > 2 {
            if let Some(out) = drain(DeflateDecoder::new(&input[2..]), "deflate after header skip")
            {
                return Ok(out);
            }
        }

        match inflate_bytes_zlib(input) {
            Ok(data) => {
                log::info!("inflate crate recovery succeeded: {} bytes", data.len());
                return Ok(data);
            },
            Err(e) => log::debug!("inflate crate failed: {}", e),
        }

        match LibflateDecoder::new(input) {
            Ok(decoder) => {
                if let Some(out) = drain(decoder, "libflate").filter(|o| !o.is_empty()) {
                    return Ok(out);
                }
            },
            Err(e) => log::debug!("libflate init failed: {}", e),
        }

        Err(Error::Decode("FlateDecode: all decompression strategies failed".to_string()))
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// Compress `data` with zlib at the default level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
