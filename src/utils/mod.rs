//! Utility Module Implementation
//! Author: kartik4091
//! Created: 2025-06-03 09:14:13 UTC

pub mod logger;

pub use logger::{init_logging, LogLevel};
