//! Compressed DCC container handling
//! Created: 2025-06-03 16:14:13 UTC
//! Author: kartik4905
//!
//! Container layout, all integers little-endian:
//! `u32 uncompressed length | u32 compressed length | u32 CRC32 | zlib payload`.
//! The CRC32 covers the uncompressed XML.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Crc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::CompressionError;

pub const HEADER_LEN: usize = 12;

/// Default bound on the inflated size.
pub const DEFAULT_MAX_UNCOMPRESSED: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressedDcc {
    pub bytes_uncompressed: u32,
    pub bytes_compressed: u32,
    pub crc32: u32,
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl CompressedDcc {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.bytes_uncompressed.to_le_bytes());
        out.extend_from_slice(&self.bytes_compressed.to_le_bytes());
        out.extend_from_slice(&self.crc32.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CompressionError> {
        if data.len() < HEADER_LEN {
            return Err(CompressionError::Truncated(data.len()));
        }
        let word = |offset: usize| u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]);
        let container = Self {
            bytes_uncompressed: word(0),
            bytes_compressed: word(4),
            crc32: word(8),
            payload: data[HEADER_LEN..].to_vec(),
        };

        if container.bytes_compressed as usize != container.payload.len() {
            return Err(CompressionError::CompressedLengthMismatch {
                declared: container.bytes_compressed as usize,
                actual: container.payload.len(),
            });
        }
        Ok(container)
    }
}

#[derive(Debug)]
pub struct CompressionHandler {
    max_uncompressed: usize,
}

impl Default for CompressionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionHandler {
    pub fn new() -> Self {
        Self {
            max_uncompressed: DEFAULT_MAX_UNCOMPRESSED,
        }
    }

    pub fn with_max_uncompressed(mut self, max: usize) -> Self {
        self.max_uncompressed = max;
        self
    }

    #[instrument(skip_all, fields(len = data.len()))]
    pub fn compress(&self, data: &[u8]) -> Result<CompressedDcc, CompressionError> {
        let bytes_uncompressed = u32::try_from(data.len()).map_err(|_| CompressionError::TooLarge(data.len()))?;

        let payload = deflate(data, Vec::new())?;
        let bytes_compressed =
            u32::try_from(payload.len()).map_err(|_| CompressionError::TooLarge(payload.len()))?;

        debug!(compressed = payload.len(), "DCC compressed");

        Ok(CompressedDcc {
            bytes_uncompressed,
            bytes_compressed,
            crc32: crc32(data),
            payload,
        })
    }

    /// Inflates and checks a container: the inflated size must equal the
    /// declared size (and stay within the configured bound), and the CRC32
    /// must match.
    #[instrument(skip_all, fields(declared = container.bytes_uncompressed))]
    pub fn decompress(&self, container: &CompressedDcc) -> Result<Vec<u8>, CompressionError> {
        let declared = container.bytes_uncompressed as usize;
        if declared > self.max_uncompressed {
            return Err(CompressionError::TooLarge(declared));
        }

        let mut data = Vec::with_capacity(declared);
        ZlibDecoder::new(container.payload.as_slice())
            .take(declared as u64 + 1)
            .read_to_end(&mut data)
            .map_err(|e| CompressionError::Inflate(e.to_string()))?;

        if data.len() != declared {
            return Err(CompressionError::UncompressedLengthMismatch {
                declared,
                actual: data.len(),
            });
        }

        let actual = crc32(&data);
        if actual != container.crc32 {
            warn!(expected = container.crc32, actual, "CRC32 mismatch in compressed DCC");
            return Err(CompressionError::CrcMismatch {
                expected: container.crc32,
                actual,
            });
        }

        debug!(inflated = data.len(), "DCC decompressed");
        Ok(data)
    }

    pub fn decompress_bytes(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let container = CompressedDcc::from_bytes(data)?;
        self.decompress(&container)
    }
}

fn deflate<W: Write>(data: &[u8], sink: W) -> Result<W, CompressionError> {
    let mut encoder = ZlibEncoder::new(sink, Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CompressionError::Deflate(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CompressionError::Deflate(e.to_string()))
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

/// Compresses with default settings.
pub fn compress(data: &[u8]) -> Result<CompressedDcc, CompressionError> {
    CompressionHandler::new().compress(data)
}

/// Parses and inflates a serialized container with default limits.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    CompressionHandler::new().decompress_bytes(data)
}
