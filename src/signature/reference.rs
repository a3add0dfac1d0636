//! Reference dereferencing and digest verification
//! Author: kartik4905
//! Created: 2025-06-04 15:00:00 UTC

use std::borrow::Cow;
use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use crate::c14n::{canonicalize, C14nMethod};
use crate::error::SignatureError;
use crate::hash_utils::verify_hash;
use crate::signature::model::{ParsedSignature, Reference};
use crate::structure::{NodeId, XmlTree};

const ID_ATTRIBUTES: [&str; 3] = ["Id", "ID", "id"];

/// Recomputes every reference digest of `signature` and enforces coverage:
/// some reference must cover the document root, and the XAdES signed
/// properties (which carry the signing time) must themselves be referenced.
#[instrument(skip_all, fields(references = signature.references.len()))]
pub fn verify_references(tree: &XmlTree, signature: &ParsedSignature) -> Result<(), SignatureError> {
    // references are always evaluated with the signature removed from the content
    let tree: Cow<'_, XmlTree> = if tree.is_detached(signature.node) {
        Cow::Borrowed(tree)
    } else {
        let mut owned = tree.clone();
        owned.detach(signature.node);
        Cow::Owned(owned)
    };
    let tree = tree.as_ref();

    let ids = id_index(tree)?;
    let root = tree
        .root_element()
        .ok_or_else(|| SignatureError::Malformed("document has no root element".into()))?;
    let signature_parent = tree.parent(signature.node);

    let mut covers_root = false;
    let mut covers_signed_properties = false;

    for reference in &signature.references {
        let target = resolve(tree, &ids, &reference.uri)?;

        let envelops_signature =
            signature_parent.map_or(false, |parent| tree.is_ancestor_or_self(target, parent));
        if envelops_signature && !reference.has_enveloped_transform() {
            return Err(SignatureError::Malformed(format!(
                "reference '{}' covers the signature without the enveloped-signature transform",
                reference.uri
            )));
        }

        if reference.is_signed_properties() && Some(target) != signature.signed_properties {
            return Err(SignatureError::Malformed(format!(
                "reference '{}' is typed as SignedProperties but targets another element",
                reference.uri
            )));
        }

        covers_root |= target == tree.document() || target == root;
        covers_signed_properties |= Some(target) == signature.signed_properties;

        check_digest(tree, target, reference)?;
    }

    if !covers_root {
        return Err(SignatureError::Malformed("no reference covers the document root".into()));
    }
    if signature.signed_properties.is_some() && !covers_signed_properties {
        return Err(SignatureError::Malformed("signed properties are not referenced".into()));
    }
    Ok(())
}

/// Empty and bare-name URIs drop comments from the node set whatever the
/// canonicalization says; `#xpointer(...)` URIs keep them.
fn reference_canonicalization(reference: &Reference) -> C14nMethod {
    let method = reference.canonicalization();
    if reference.uri.starts_with("#xpointer(") {
        method
    } else {
        method.without_comments()
    }
}

fn check_digest(tree: &XmlTree, target: NodeId, reference: &Reference) -> Result<(), SignatureError> {
    let method = reference_canonicalization(reference);
    let octets = canonicalize(tree, target, &method);

    if !verify_hash(&octets, &reference.digest_value, reference.digest_method)? {
        warn!(uri = %reference.uri, algorithm = %reference.digest_method, "Reference digest mismatch");
        return Err(SignatureError::DigestMismatch {
            uri: reference.uri.clone(),
        });
    }
    debug!(uri = %reference.uri, bytes = octets.len(), "Reference digest verified");
    Ok(())
}

/// Maps `Id`-style attribute values to their elements, rejecting duplicates.
fn id_index(tree: &XmlTree) -> Result<HashMap<String, NodeId>, SignatureError> {
    let mut index = HashMap::new();
    for (node, element) in tree.all_elements() {
        for name in ID_ATTRIBUTES {
            if let Some(value) = element.attribute(name) {
                if index.insert(value.to_string(), node).is_some() {
                    return Err(SignatureError::Malformed(format!("duplicate Id '{}'", value)));
                }
            }
        }
    }
    Ok(index)
}

fn resolve(tree: &XmlTree, ids: &HashMap<String, NodeId>, uri: &str) -> Result<NodeId, SignatureError> {
    let Some(fragment) = uri.strip_prefix('#') else {
        return if uri.is_empty() {
            Ok(tree.document())
        } else {
            Err(SignatureError::Unsupported(format!("external reference '{}'", uri)))
        };
    };

    if fragment == "xpointer(/)" {
        return Ok(tree.document());
    }
    let id = fragment
        .strip_prefix("xpointer(id('")
        .and_then(|rest| rest.strip_suffix("'))"))
        .unwrap_or(fragment);

    ids.get(id)
        .copied()
        .ok_or_else(|| SignatureError::Malformed(format!("reference target '{}' not found", uri)))
}
