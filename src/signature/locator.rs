//! Signature locator and XAdES profile classifier
//! Author: kartik4905
//! Created: 2025-06-04 14:10:00 UTC

use tracing::debug;

use crate::signature::{SignatureProfile, DSIG_NS, XADES141_NS, XADES_NS};
use crate::structure::{NodeId, XmlTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureLocation {
    /// The `ds:Signature` element; `None` only for [`SignatureProfile::Absent`].
    pub node: Option<NodeId>,
    pub profile: SignatureProfile,
}

/// Finds the document's signature and classifies it.
///
/// Exactly one `ds:Signature`, enveloped as a direct child of the root
/// element, is supported. Parallel signatures and XAdES counter-signatures
/// make the document unsupported rather than being ignored.
pub fn locate_signature(tree: &XmlTree) -> SignatureLocation {
    let signatures = tree.elements_named(DSIG_NS, "Signature");
    let Some(&node) = signatures.first() else {
        return SignatureLocation {
            node: None,
            profile: SignatureProfile::Absent,
        };
    };

    let unsupported = |reason: String| SignatureLocation {
        node: Some(node),
        profile: SignatureProfile::Unsupported(reason),
    };

    if signatures.len() > 1 {
        return unsupported(format!("{} signature elements found", signatures.len()));
    }
    if !tree.elements_named(XADES_NS, "CounterSignature").is_empty() {
        return unsupported("counter-signatures are not supported".into());
    }
    if tree.parent(node) != tree.root_element() {
        return unsupported("signature is not enveloped in the root element".into());
    }

    let profile = classify_profile(tree, node);
    debug!(%profile, "Signature located");
    SignatureLocation {
        node: Some(node),
        profile,
    }
}

/// Classifies one `ds:Signature` by the XAdES properties it carries.
pub fn classify_profile(tree: &XmlTree, signature: NodeId) -> SignatureProfile {
    let Some(qualifying) = qualifying_properties(tree, signature) else {
        return SignatureProfile::Unsupported("no XAdES qualifying properties".into());
    };

    let signing_time = tree.find_path(
        qualifying,
        XADES_NS,
        &["SignedProperties", "SignedSignatureProperties", "SigningTime"],
    );
    if signing_time.is_none() {
        return SignatureProfile::Unsupported("no signing time in signed properties".into());
    }

    let unsigned = tree.find_path(
        qualifying,
        XADES_NS,
        &["UnsignedProperties", "UnsignedSignatureProperties"],
    );
    let Some(unsigned) = unsigned else {
        return SignatureProfile::BaselineB;
    };

    let has = |ns: &str, local: &str| tree.find_child(unsigned, ns, local).is_some();
    let archive = has(XADES141_NS, "ArchiveTimeStamp") || has(XADES_NS, "ArchiveTimeStamp");
    let long_term = has(XADES_NS, "CertificateValues") && has(XADES_NS, "RevocationValues");

    if archive || long_term {
        SignatureProfile::BaselineLT
    } else if has(XADES_NS, "SignatureTimeStamp") {
        SignatureProfile::BaselineT
    } else {
        SignatureProfile::BaselineB
    }
}

/// `xades:QualifyingProperties` inside one of the signature's `ds:Object`s.
pub(crate) fn qualifying_properties(tree: &XmlTree, signature: NodeId) -> Option<NodeId> {
    tree.find_children(signature, DSIG_NS, "Object")
        .into_iter()
        .find_map(|object| tree.find_child(object, XADES_NS, "QualifyingProperties"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::parse_xml;

    fn signed(unsigned_props: &str) -> String {
        format!(
            r##"<r xmlns:ds="{ds}" xmlns:xades="{xa}" xmlns:xa141="{xa141}"><data/><ds:Signature Id="s"><ds:SignedInfo/><ds:Object><xades:QualifyingProperties Target="#s"><xades:SignedProperties Id="sp"><xades:SignedSignatureProperties><xades:SigningTime>2023-03-27T15:14:30Z</xades:SigningTime></xades:SignedSignatureProperties></xades:SignedProperties>{unsigned}</xades:QualifyingProperties></ds:Object></ds:Signature></r>"##,
            ds = DSIG_NS,
            xa = XADES_NS,
            xa141 = XADES141_NS,
            unsigned = unsigned_props,
        )
    }

    fn profile_of(xml: &str) -> SignatureProfile {
        locate_signature(&parse_xml(xml.as_bytes()).unwrap()).profile
    }

    #[test]
    fn test_absent() {
        let location = locate_signature(&parse_xml(b"<r><a/></r>").unwrap());
        assert_eq!(location.profile, SignatureProfile::Absent);
        assert_eq!(location.node, None);
    }

    #[test]
    fn test_baseline_b() {
        assert_eq!(profile_of(&signed("")), SignatureProfile::BaselineB);
    }

    #[test]
    fn test_baseline_t() {
        let unsigned = "<xades:UnsignedProperties><xades:UnsignedSignatureProperties><xades:SignatureTimeStamp/></xades:UnsignedSignatureProperties></xades:UnsignedProperties>";
        assert_eq!(profile_of(&signed(unsigned)), SignatureProfile::BaselineT);
    }

    #[test]
    fn test_baseline_lt() {
        let archive = "<xades:UnsignedProperties><xades:UnsignedSignatureProperties><xades:SignatureTimeStamp/><xa141:ArchiveTimeStamp/></xades:UnsignedSignatureProperties></xades:UnsignedProperties>";
        assert_eq!(profile_of(&signed(archive)), SignatureProfile::BaselineLT);

        let values = "<xades:UnsignedProperties><xades:UnsignedSignatureProperties><xades:SignatureTimeStamp/><xades:CertificateValues/><xades:RevocationValues/></xades:UnsignedSignatureProperties></xades:UnsignedProperties>";
        assert_eq!(profile_of(&signed(values)), SignatureProfile::BaselineLT);
    }

    #[test]
    fn test_parallel_signatures_unsupported() {
        let xml = signed("").replace("<data/>", &format!("<data><ds:Signature xmlns:ds=\"{}\"/></data>", DSIG_NS));
        assert!(matches!(profile_of(&xml), SignatureProfile::Unsupported(_)));
    }

    #[test]
    fn test_counter_signature_unsupported() {
        let unsigned = "<xades:UnsignedProperties><xades:UnsignedSignatureProperties><xades:CounterSignature/></xades:UnsignedSignatureProperties></xades:UnsignedProperties>";
        assert!(matches!(profile_of(&signed(unsigned)), SignatureProfile::Unsupported(_)));
    }

    #[test]
    fn test_missing_signing_time_unsupported() {
        let xml = signed("").replace(
            "<xades:SigningTime>2023-03-27T15:14:30Z</xades:SigningTime>",
            "",
        );
        assert!(matches!(profile_of(&xml), SignatureProfile::Unsupported(_)));
    }
}
