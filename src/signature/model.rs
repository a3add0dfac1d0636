//! XML-DSig / XAdES signature model
//! Author: kartik4905
//! Created: 2025-06-04 14:30:00 UTC
//!
//! Reads the parts of a `ds:Signature` the verifier needs: `SignedInfo` and
//! its references, the signature value, bundled certificates, the signing
//! time and the XAdES signing-certificate digests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::c14n::C14nMethod;
use crate::error::SignatureError;
use crate::hash_utils::HashAlgorithm;
use crate::signature::locator::qualifying_properties;
use crate::signature::{DSIG_NS, ENVELOPED_SIGNATURE, SIGNED_PROPERTIES_TYPE, XADES_NS};
use crate::structure::{NodeId, XmlTree};
use crate::verifier::Certificate;

const EXC_C14N_NS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    RsaPkcs1,
    RsaPss,
    Ecdsa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureMethod {
    pub key: KeyAlgorithm,
    pub digest: HashAlgorithm,
}

impl SignatureMethod {
    pub fn from_uri(uri: &str) -> Option<Self> {
        use HashAlgorithm::*;
        use KeyAlgorithm::*;

        let (key, digest) = match uri {
            "http://www.w3.org/2000/09/xmldsig#rsa-sha1" => (RsaPkcs1, SHA1),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256" => (RsaPkcs1, SHA256),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384" => (RsaPkcs1, SHA384),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512" => (RsaPkcs1, SHA512),
            "http://www.w3.org/2007/05/xmldsig-more#sha256-rsa-MGF1" => (RsaPss, SHA256),
            "http://www.w3.org/2007/05/xmldsig-more#sha384-rsa-MGF1" => (RsaPss, SHA384),
            "http://www.w3.org/2007/05/xmldsig-more#sha512-rsa-MGF1" => (RsaPss, SHA512),
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha1" => (Ecdsa, SHA1),
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256" => (Ecdsa, SHA256),
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384" => (Ecdsa, SHA384),
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512" => (Ecdsa, SHA512),
            _ => return None,
        };
        Some(Self { key, digest })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    EnvelopedSignature,
    Canonicalize(C14nMethod),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub uri: String,
    pub ref_type: Option<String>,
    pub transforms: Vec<Transform>,
    pub digest_method: HashAlgorithm,
    pub digest_value: Vec<u8>,
}

impl Reference {
    pub fn has_enveloped_transform(&self) -> bool {
        self.transforms.contains(&Transform::EnvelopedSignature)
    }

    /// Canonicalization applied to the dereferenced node set: the last
    /// explicit transform, C14N 1.0 otherwise.
    pub fn canonicalization(&self) -> C14nMethod {
        self.transforms
            .iter()
            .rev()
            .find_map(|t| match t {
                Transform::Canonicalize(method) => Some(method.clone()),
                Transform::EnvelopedSignature => None,
            })
            .unwrap_or_default()
    }

    pub fn is_signed_properties(&self) -> bool {
        self.ref_type.as_deref() == Some(SIGNED_PROPERTIES_TYPE)
    }
}

/// `xades:Cert` entry of `SigningCertificate` / `SigningCertificateV2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningCertificateRef {
    pub digest_method: HashAlgorithm,
    pub digest_value: Vec<u8>,
}

impl SigningCertificateRef {
    pub fn matches(&self, cert: &Certificate) -> bool {
        cert.digest(self.digest_method).as_deref() == Some(self.digest_value.as_slice())
    }
}

#[derive(Debug, Clone)]
pub struct ParsedSignature {
    pub node: NodeId,
    pub signed_info: NodeId,
    pub canonicalization: C14nMethod,
    pub method: SignatureMethod,
    pub references: Vec<Reference>,
    pub signature_value: Vec<u8>,
    pub key_info_certificates: Vec<Certificate>,
    pub certificate_values: Vec<Certificate>,
    pub signed_properties: Option<NodeId>,
    pub signing_time: DateTime<Utc>,
    pub signing_certificate_refs: Vec<SigningCertificateRef>,
}

impl ParsedSignature {
    pub fn parse(tree: &XmlTree, node: NodeId) -> Result<Self, SignatureError> {
        let signed_info = tree
            .find_child(node, DSIG_NS, "SignedInfo")
            .ok_or_else(|| missing("SignedInfo"))?;

        let c14n_node = tree
            .find_child(signed_info, DSIG_NS, "CanonicalizationMethod")
            .ok_or_else(|| missing("CanonicalizationMethod"))?;
        let canonicalization = c14n_method(tree, c14n_node)?;

        let method_uri = algorithm(tree, signed_info, "SignatureMethod")?;
        let method = SignatureMethod::from_uri(&method_uri).ok_or_else(|| {
            SignatureError::Unsupported(format!("signature method {}", method_uri))
        })?;

        let references = tree
            .find_children(signed_info, DSIG_NS, "Reference")
            .into_iter()
            .map(|reference| parse_reference(tree, reference))
            .collect::<Result<Vec<_>, _>>()?;
        if references.is_empty() {
            return Err(SignatureError::Malformed("SignedInfo has no references".into()));
        }

        let value_node = tree
            .find_child(node, DSIG_NS, "SignatureValue")
            .ok_or_else(|| missing("SignatureValue"))?;
        let signature_value = decode_base64(&tree.text(value_node), "SignatureValue")?;

        let mut key_info_certificates = Vec::new();
        if let Some(key_info) = tree.find_child(node, DSIG_NS, "KeyInfo") {
            for x509_data in tree.find_children(key_info, DSIG_NS, "X509Data") {
                for cert_node in tree.find_children(x509_data, DSIG_NS, "X509Certificate") {
                    key_info_certificates.push(parse_certificate(tree, cert_node)?);
                }
            }
        }

        let qualifying = qualifying_properties(tree, node)
            .ok_or_else(|| SignatureError::Unsupported("no XAdES qualifying properties".into()))?;
        let signed_properties = tree.find_child(qualifying, XADES_NS, "SignedProperties");
        let signed_signature_properties = signed_properties
            .and_then(|sp| tree.find_child(sp, XADES_NS, "SignedSignatureProperties"))
            .ok_or_else(|| missing("SignedSignatureProperties"))?;

        let signing_time_text = tree
            .child_text(signed_signature_properties, XADES_NS, "SigningTime")
            .ok_or_else(|| SignatureError::Unsupported("no signing time in signed properties".into()))?;
        let signing_time = parse_signing_time(&signing_time_text)?;

        let mut signing_certificate_refs = Vec::new();
        for container in ["SigningCertificate", "SigningCertificateV2"] {
            if let Some(signing_cert) = tree.find_child(signed_signature_properties, XADES_NS, container) {
                for cert in tree.find_children(signing_cert, XADES_NS, "Cert") {
                    signing_certificate_refs.push(parse_cert_ref(tree, cert)?);
                }
            }
        }

        let mut certificate_values = Vec::new();
        if let Some(values) = tree.find_path(
            qualifying,
            XADES_NS,
            &["UnsignedProperties", "UnsignedSignatureProperties", "CertificateValues"],
        ) {
            for cert_node in tree.find_children(values, XADES_NS, "EncapsulatedX509Certificate") {
                certificate_values.push(parse_certificate(tree, cert_node)?);
            }
        }

        debug!(
            references = references.len(),
            certificates = key_info_certificates.len() + certificate_values.len(),
            %signing_time,
            "Signature parsed"
        );

        Ok(Self {
            node,
            signed_info,
            canonicalization,
            method,
            references,
            signature_value,
            key_info_certificates,
            certificate_values,
            signed_properties,
            signing_time,
            signing_certificate_refs,
        })
    }

    /// KeyInfo certificates followed by XAdES `CertificateValues`, without
    /// duplicates.
    pub fn bundled_certificates(&self) -> Vec<Certificate> {
        let mut out: Vec<Certificate> = Vec::new();
        for cert in self.key_info_certificates.iter().chain(&self.certificate_values) {
            if !out.contains(cert) {
                out.push(cert.clone());
            }
        }
        out
    }

    /// True when any digest or the signature method relies on SHA-1.
    pub fn uses_sha1(&self) -> bool {
        self.method.digest.is_legacy()
            || self.references.iter().any(|r| r.digest_method.is_legacy())
            || self.signing_certificate_refs.iter().any(|r| r.digest_method.is_legacy())
    }

    /// Picks the signing certificate.
    ///
    /// With XAdES signing-certificate digests present, the signer is the
    /// bundled certificate they identify. Without them, the signer is the
    /// KeyInfo certificate that issued none of the others.
    pub fn select_signer(&self, require_reference: bool) -> Result<Certificate, SignatureError> {
        let bundled = self.bundled_certificates();

        if !self.signing_certificate_refs.is_empty() {
            return bundled
                .into_iter()
                .find(|cert| self.signing_certificate_refs.iter().any(|r| r.matches(cert)))
                .ok_or(SignatureError::SigningCertificateMismatch);
        }
        if require_reference {
            return Err(SignatureError::Malformed(
                "signed properties carry no signing certificate reference".into(),
            ));
        }

        let certs = &self.key_info_certificates;
        certs
            .iter()
            .find(|candidate| {
                !certs
                    .iter()
                    .any(|other| other != *candidate && other.is_issued_by_name(candidate))
            })
            .or_else(|| certs.first())
            .cloned()
            .ok_or_else(|| SignatureError::Malformed("KeyInfo carries no X.509 certificate".into()))
    }
}

fn missing(element: &str) -> SignatureError {
    SignatureError::Malformed(format!("missing {}", element))
}

fn algorithm(tree: &XmlTree, parent: NodeId, local: &str) -> Result<String, SignatureError> {
    let node = tree.find_child(parent, DSIG_NS, local).ok_or_else(|| missing(local))?;
    tree.element(node)
        .and_then(|e| e.attribute("Algorithm"))
        .map(str::to_string)
        .ok_or_else(|| SignatureError::Malformed(format!("{} has no Algorithm", local)))
}

fn c14n_method(tree: &XmlTree, node: NodeId) -> Result<C14nMethod, SignatureError> {
    let uri = tree
        .element(node)
        .and_then(|e| e.attribute("Algorithm"))
        .ok_or_else(|| SignatureError::Malformed("canonicalization without Algorithm".into()))?;
    let method = C14nMethod::from_uri(uri)
        .ok_or_else(|| SignatureError::Unsupported(format!("canonicalization {}", uri)))?;

    let prefixes = tree
        .find_child(node, EXC_C14N_NS, "InclusiveNamespaces")
        .and_then(|n| tree.element(n))
        .and_then(|e| e.attribute("PrefixList"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    Ok(method.with_prefixes(prefixes))
}

fn parse_reference(tree: &XmlTree, node: NodeId) -> Result<Reference, SignatureError> {
    let element = tree.element(node).ok_or_else(|| missing("Reference"))?;
    let uri = element.attribute("URI").unwrap_or("").to_string();
    let ref_type = element.attribute("Type").map(str::to_string);

    let mut transforms = Vec::new();
    if let Some(list) = tree.find_child(node, DSIG_NS, "Transforms") {
        for transform in tree.find_children(list, DSIG_NS, "Transform") {
            let uri = tree
                .element(transform)
                .and_then(|e| e.attribute("Algorithm"))
                .ok_or_else(|| SignatureError::Malformed("Transform has no Algorithm".into()))?;
            if uri == ENVELOPED_SIGNATURE {
                transforms.push(Transform::EnvelopedSignature);
            } else if C14nMethod::from_uri(uri).is_some() {
                transforms.push(Transform::Canonicalize(c14n_method(tree, transform)?));
            } else {
                return Err(SignatureError::Unsupported(format!("transform {}", uri)));
            }
        }
    }

    let digest_uri = algorithm(tree, node, "DigestMethod")?;
    let digest_method = HashAlgorithm::from_uri(&digest_uri)
        .ok_or_else(|| SignatureError::Unsupported(format!("digest method {}", digest_uri)))?;
    let digest_node = tree
        .find_child(node, DSIG_NS, "DigestValue")
        .ok_or_else(|| missing("DigestValue"))?;
    let digest_value = decode_base64(&tree.text(digest_node), "DigestValue")?;

    Ok(Reference {
        uri,
        ref_type,
        transforms,
        digest_method,
        digest_value,
    })
}

fn parse_cert_ref(tree: &XmlTree, cert: NodeId) -> Result<SigningCertificateRef, SignatureError> {
    let digest = tree
        .find_child(cert, XADES_NS, "CertDigest")
        .ok_or_else(|| missing("CertDigest"))?;
    let uri = algorithm(tree, digest, "DigestMethod")?;
    let digest_method = HashAlgorithm::from_uri(&uri)
        .ok_or_else(|| SignatureError::Unsupported(format!("certificate digest {}", uri)))?;
    let value = tree
        .find_child(digest, DSIG_NS, "DigestValue")
        .ok_or_else(|| missing("CertDigest/DigestValue"))?;

    Ok(SigningCertificateRef {
        digest_method,
        digest_value: decode_base64(&tree.text(value), "CertDigest")?,
    })
}

fn parse_certificate(tree: &XmlTree, node: NodeId) -> Result<Certificate, SignatureError> {
    let der = decode_base64(&tree.text(node), "X509Certificate")?;
    Certificate::from_der(&der)
        .map_err(|e| SignatureError::Malformed(format!("embedded certificate: {}", e)))
}

fn decode_base64(text: &str, what: &str) -> Result<Vec<u8>, SignatureError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| SignatureError::Malformed(format!("{}: {}", what, e)))
}

/// `xs:dateTime`; a value without a zone designator is taken as UTC.
pub fn parse_signing_time(text: &str) -> Result<DateTime<Utc>, SignatureError> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| SignatureError::Malformed(format!("invalid SigningTime '{}'", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signing_time_formats() {
        let expected = Utc.with_ymd_and_hms(2023, 3, 27, 15, 14, 30).unwrap();
        assert_eq!(parse_signing_time("2023-03-27T15:14:30Z").unwrap(), expected);
        assert_eq!(parse_signing_time("2023-03-27T17:14:30+02:00").unwrap(), expected);
        assert_eq!(parse_signing_time(" 2023-03-27T15:14:30 ").unwrap(), expected);
        assert!(parse_signing_time("27.03.2023").is_err());
    }

    #[test]
    fn test_signature_method_uris() {
        let method = SignatureMethod::from_uri("http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256").unwrap();
        assert_eq!(method.key, KeyAlgorithm::Ecdsa);
        assert_eq!(method.digest, HashAlgorithm::SHA256);
        assert!(SignatureMethod::from_uri("http://www.w3.org/2000/09/xmldsig#dsa-sha1").is_none());
    }

    #[test]
    fn test_reference_default_canonicalization() {
        let reference = Reference {
            uri: String::new(),
            ref_type: None,
            transforms: vec![Transform::EnvelopedSignature],
            digest_method: HashAlgorithm::SHA256,
            digest_value: Vec::new(),
        };
        assert!(reference.has_enveloped_transform());
        assert_eq!(reference.canonicalization(), C14nMethod::inclusive());
    }
}
