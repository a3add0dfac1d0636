// Type definitions for the DCC document model

pub mod document;

pub use document::*;
