//! Certificate verification modules
//! Author: kartik4905
//! Created: 2025-06-04 10:24:00 UTC
//!
//! Trust store, chain building and chain-model path validation for the
//! certificate that signed a DCC.

pub mod certificate;
pub mod chain_builder;
pub mod path_validator;
pub mod revocation;
pub mod trust_store;

#[cfg(test)]
pub(crate) mod test_pki;

pub use self::{
    certificate::{Certificate, CertificateSummary},
    chain_builder::{CertificateChain, ChainBuilder, DEFAULT_MAX_CHAIN_DEPTH},
    path_validator::validate_path,
    revocation::{RevocationCheck, StaticRevocationList},
    trust_store::TrustStore,
};
