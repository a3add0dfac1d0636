//! Output module for compressed DCC containers
//! Created: 2025-06-03 16:18:02 UTC
//! Author: kartik4091

pub mod compression_handler;

pub use compression_handler::{compress, crc32, decompress, CompressedDcc, CompressionHandler};
