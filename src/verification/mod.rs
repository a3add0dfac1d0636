//! Verification collaborators
//! Created: 2025-06-03 13:59:42 UTC
//! Author: kartik4091

pub mod schema_validator;

pub use schema_validator::{SchemaReport, SchemaSource, SchemaValidator, StructuralValidator};
