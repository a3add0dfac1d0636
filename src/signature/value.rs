//! SignatureValue verification over canonical SignedInfo
//! Author: kartik4905
//! Created: 2025-06-04 15:20:00 UTC

use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::error::ErrorStack;
use openssl::rsa::Padding;
use openssl::sign::{RsaPssSaltlen, Verifier};
use tracing::{debug, instrument, warn};

use crate::c14n::canonicalize;
use crate::error::SignatureError;
use crate::signature::model::{KeyAlgorithm, ParsedSignature};
use crate::structure::XmlTree;
use crate::verifier::Certificate;

#[instrument(skip_all, fields(signer = %signer.subject()))]
pub fn verify_signature_value(
    tree: &XmlTree,
    signature: &ParsedSignature,
    signer: &Certificate,
) -> Result<(), SignatureError> {
    let signed_info = canonicalize(tree, signature.signed_info, &signature.canonicalization);

    let valid = check(signature, signer, &signed_info).map_err(|e| {
        SignatureError::Malformed(format!("signature value could not be evaluated: {}", e))
    })?;

    if !valid {
        warn!("SignatureValue does not verify over SignedInfo");
        return Err(SignatureError::SignatureValueMismatch);
    }
    debug!("SignatureValue verified");
    Ok(())
}

fn check(signature: &ParsedSignature, signer: &Certificate, data: &[u8]) -> Result<bool, ErrorStack> {
    let key = signer.x509().public_key()?;
    let digest = signature.method.digest.message_digest();

    let encoded = match signature.method.key {
        KeyAlgorithm::Ecdsa => match raw_to_der(&signature.signature_value)? {
            Some(der) => der,
            None => return Ok(false),
        },
        _ => signature.signature_value.clone(),
    };

    let mut verifier = Verifier::new(digest, &key)?;
    if signature.method.key == KeyAlgorithm::RsaPss {
        verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
        verifier.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
    }
    verifier.update(data)?;
    // openssl reports a malformed signature as an error, which is a mismatch here
    Ok(verifier.verify(&encoded).unwrap_or(false))
}

/// XML-DSig carries ECDSA signatures as `r || s`; openssl wants DER.
fn raw_to_der(raw: &[u8]) -> Result<Option<Vec<u8>>, ErrorStack> {
    if raw.is_empty() || raw.len() % 2 != 0 {
        return Ok(None);
    }
    let (r, s) = raw.split_at(raw.len() / 2);
    let sig = EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?;
    sig.to_der().map(Some)
}
