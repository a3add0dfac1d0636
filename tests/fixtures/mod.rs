//! Shared fixtures for integration tests: a throwaway PKI (EC P-256, with an
//! optional RSA leaf) and a signer producing enveloped XAdES signatures over
//! DCC documents.

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use dcc_verify::c14n::{canonicalize, C14nMethod};
use dcc_verify::structure::parse_xml;
use dcc_verify::{Certificate, TrustStore};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::{hash, MessageDigest};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::{Padding, Rsa};
use openssl::sign::{RsaPssSaltlen, Signer};
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509NameBuilder, X509};

const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
const XADES: &str = "http://uri.etsi.org/01903/v1.3.2#";
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const C14N_10: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const C14N_11: &str = "http://www.w3.org/2006/12/xml-c14n11";
const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
const ROOT_CLOSE: &str = "</dcc:digitalCalibrationCertificate>";

pub struct TestFixtures;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    EcP256,
    Rsa2048,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    EcdsaSha256,
    RsaSha256,
    RsaPssSha256,
}

impl SignatureAlgorithm {
    pub fn uri(self) -> &'static str {
        match self {
            SignatureAlgorithm::EcdsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256",
            SignatureAlgorithm::RsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            SignatureAlgorithm::RsaPssSha256 => "http://www.w3.org/2007/05/xmldsig-more#sha256-rsa-MGF1",
        }
    }
}

pub struct Issued {
    pub key: PKey<Private>,
    pub cert: X509,
}

impl Issued {
    pub fn certificate(&self) -> Certificate {
        Certificate::from_der(&self.cert.to_der().unwrap()).unwrap()
    }
}

/// Root ← intermediate ← leaf.
pub struct TestPki {
    pub root: Issued,
    pub intermediate: Issued,
    pub leaf: Issued,
}

impl TestPki {
    pub fn trust_store(&self, with_intermediate: bool) -> TrustStore {
        let mut store = TrustStore::new();
        store.add_root(self.root.certificate());
        if with_intermediate {
            store.add_intermediate(self.intermediate.certificate());
        }
        store
    }
}

/// What goes into a signature besides the document.
pub struct SignOptions<'a> {
    pub signing_time: &'a str,
    /// Certificates added to KeyInfo after the leaf.
    pub bundled: Vec<&'a X509>,
    /// Must match the leaf key.
    pub algorithm: SignatureAlgorithm,
    /// Used for SignedInfo and both references.
    pub canonicalization: &'a str,
    /// Content of `xades:UnsignedSignatureProperties`; empty for Baseline-B.
    pub unsigned_properties: String,
}

impl Default for SignOptions<'_> {
    fn default() -> Self {
        Self {
            signing_time: TestFixtures::SIGNING_TIME,
            bundled: Vec::new(),
            algorithm: SignatureAlgorithm::EcdsaSha256,
            canonicalization: EXC_C14N,
            unsigned_properties: String::new(),
        }
    }
}

impl TestFixtures {
    pub const SIGNING_TIME: &'static str = "2024-03-01T12:00:00Z";

    pub fn signing_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    pub fn unsigned_dcc() -> String {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<dcc:digitalCalibrationCertificate xmlns:dcc="https://ptb.de/dcc" schemaVersion="3.2.1">
  <dcc:administrativeData>
    <dcc:dccSoftware>
      <dcc:software>
        <dcc:name><dcc:content>Notepad++ (32-bit)</dcc:content></dcc:name>
        <dcc:release>v 8.2</dcc:release>
      </dcc:software>
    </dcc:dccSoftware>
    <dcc:coreData>
      <dcc:countryCodeISO3166_1>DE</dcc:countryCodeISO3166_1>
      <dcc:usedLangCodeISO639_1>en</dcc:usedLangCodeISO639_1>
      <dcc:usedLangCodeISO639_1>de</dcc:usedLangCodeISO639_1>
      <dcc:mandatoryLangCodeISO639_1>en</dcc:mandatoryLangCodeISO639_1>
      <dcc:uniqueIdentifier>GP_DCC_temperature_typical_1.2</dcc:uniqueIdentifier>
      <dcc:receiptDate>2022-09-16</dcc:receiptDate>
      <dcc:beginPerformanceDate>2022-09-23</dcc:beginPerformanceDate>
      <dcc:endPerformanceDate>2022-09-24</dcc:endPerformanceDate>
      <dcc:performanceLocation>laboratory</dcc:performanceLocation>
      <dcc:previousReport>
        <dcc:referenceID>GP_DCC_temperature_typical_1.1</dcc:referenceID>
      </dcc:previousReport>
    </dcc:coreData>
    <dcc:items>
      <dcc:item>
        <dcc:name><dcc:content lang="en">Temperature sensor</dcc:content></dcc:name>
        <dcc:identifications>
          <dcc:identification>
            <dcc:issuer>manufacturer</dcc:issuer>
            <dcc:value>string-manufacturer-item</dcc:value>
            <dcc:name>
              <dcc:content lang="de">Serien Nr.</dcc:content>
              <dcc:content lang="en">Serial no.</dcc:content>
            </dcc:name>
          </dcc:identification>
          <dcc:identification>
            <dcc:issuer>customer</dcc:issuer>
            <dcc:value>string-customer-item</dcc:value>
            <dcc:name>
              <dcc:content lang="de">Messmittel Nr.</dcc:content>
              <dcc:content lang="en">Measurement equipment no.</dcc:content>
            </dcc:name>
          </dcc:identification>
        </dcc:identifications>
      </dcc:item>
    </dcc:items>
    <dcc:calibrationLaboratory>
      <dcc:contact>
        <dcc:name><dcc:content>Kalibrierfirma GmbH</dcc:content></dcc:name>
      </dcc:contact>
    </dcc:calibrationLaboratory>
  </dcc:administrativeData>
  <dcc:measurementResults>
    <dcc:measurementResult>
      <dcc:name><dcc:content lang="en">Measurement results</dcc:content></dcc:name>
      <dcc:results>
        <dcc:result refType="basic_measurementError">
          <dcc:name><dcc:content lang="en">Measurement error</dcc:content></dcc:name>
        </dcc:result>
      </dcc:results>
      <dcc:measurementMetaData>
        <dcc:metaData refType="basic_conformity">
          <dcc:declaration><dcc:content lang="en">Conformity</dcc:content></dcc:declaration>
          <dcc:conformityXml>pass</dcc:conformityXml>
        </dcc:metaData>
      </dcc:measurementMetaData>
    </dcc:measurementResult>
  </dcc:measurementResults>
</dcc:digitalCalibrationCertificate>
"#
        .to_string()
    }

    /// PKI whose leaf is valid 2023-01-01 to 2025-01-01: valid at
    /// [`Self::SIGNING_TIME`] but expired today.
    pub fn pki() -> TestPki {
        Self::pki_with_leaf_validity(unix(2023, 1, 1), unix(2025, 1, 1))
    }

    /// PKI like [`Self::pki`] with a 2048-bit RSA leaf.
    pub fn rsa_pki() -> TestPki {
        let mut pki = Self::pki();
        pki.leaf = Self::issue_with_key(
            "Kalibrierfirma Signer",
            Some(&pki.intermediate),
            4,
            unix(2023, 1, 1),
            unix(2025, 1, 1),
            false,
            KeyKind::Rsa2048,
        );
        pki
    }

    pub fn pki_with_leaf_validity(not_before: i64, not_after: i64) -> TestPki {
        let root = Self::issue("Test Root CA", None, 1, unix(2020, 1, 1), unix(2040, 1, 1), true);
        let intermediate = Self::issue(
            "Test Intermediate CA",
            Some(&root),
            2,
            unix(2021, 1, 1),
            unix(2035, 1, 1),
            true,
        );
        let leaf = Self::issue(
            "Kalibrierfirma Signer",
            Some(&intermediate),
            3,
            not_before,
            not_after,
            false,
        );
        TestPki { root, intermediate, leaf }
    }

    /// A self-signed root unrelated to any [`TestPki`].
    pub fn foreign_root() -> Issued {
        Self::issue("Foreign Root CA", None, 99, unix(2020, 1, 1), unix(2040, 1, 1), true)
    }

    pub fn issue(
        common_name: &str,
        issuer: Option<&Issued>,
        serial: u32,
        not_before: i64,
        not_after: i64,
        ca: bool,
    ) -> Issued {
        Self::issue_with_key(common_name, issuer, serial, not_before, not_after, ca, KeyKind::EcP256)
    }

    pub fn issue_with_key(
        common_name: &str,
        issuer: Option<&Issued>,
        serial: u32,
        not_before: i64,
        not_after: i64,
        ca: bool,
        kind: KeyKind,
    ) -> Issued {
        let key = match kind {
            KeyKind::EcP256 => {
                let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
                PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
            }
            KeyKind::Rsa2048 => PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap(),
        };

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", common_name).unwrap();
        name.append_entry_by_text("O", "DCC Test PKI").unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        match issuer {
            Some(issuer) => builder.set_issuer_name(issuer.cert.subject_name()).unwrap(),
            None => builder.set_issuer_name(&name).unwrap(),
        }
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&Asn1Time::from_unix(not_before).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::from_unix(not_after).unwrap()).unwrap();
        if ca {
            builder
                .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
                .unwrap();
        }
        let signing_key = issuer.map(|i| &i.key).unwrap_or(&key);
        builder.sign(signing_key, MessageDigest::sha256()).unwrap();

        Issued {
            key,
            cert: builder.build(),
        }
    }

    /// Signs `xml` with the PKI's leaf: one reference over the whole document
    /// (enveloped + the chosen c14n) and one over the XAdES signed properties.
    pub fn sign(xml: &str, pki: &TestPki, options: &SignOptions) -> String {
        let leaf_der = pki.leaf.cert.to_der().unwrap();
        let cert_digest = STANDARD.encode(hash(MessageDigest::sha256(), &leaf_der).unwrap());

        let mut key_info = format!("<ds:X509Certificate>{}</ds:X509Certificate>", STANDARD.encode(&leaf_der));
        for cert in &options.bundled {
            key_info.push_str(&format!(
                "<ds:X509Certificate>{}</ds:X509Certificate>",
                STANDARD.encode(cert.to_der().unwrap())
            ));
        }

        let unsigned = if options.unsigned_properties.is_empty() {
            String::new()
        } else {
            format!(
                "<xades:UnsignedProperties><xades:UnsignedSignatureProperties>{}</xades:UnsignedSignatureProperties></xades:UnsignedProperties>",
                options.unsigned_properties
            )
        };

        let signature = format!(
            r##"<ds:Signature xmlns:ds="{dsig}" Id="signature-1"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="{c14n}"/><ds:SignatureMethod Algorithm="{method}"/><ds:Reference Id="reference-document" URI=""><ds:Transforms><ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/><ds:Transform Algorithm="{c14n}"/></ds:Transforms><ds:DigestMethod Algorithm="{sha256}"/><ds:DigestValue>@DOCUMENT@</ds:DigestValue></ds:Reference><ds:Reference Type="http://uri.etsi.org/01903#SignedProperties" URI="#signed-properties"><ds:Transforms><ds:Transform Algorithm="{c14n}"/></ds:Transforms><ds:DigestMethod Algorithm="{sha256}"/><ds:DigestValue>@PROPERTIES@</ds:DigestValue></ds:Reference></ds:SignedInfo><ds:SignatureValue>@SIGNATURE@</ds:SignatureValue><ds:KeyInfo><ds:X509Data>{key_info}</ds:X509Data></ds:KeyInfo><ds:Object><xades:QualifyingProperties xmlns:xades="{xades}" Target="#signature-1"><xades:SignedProperties Id="signed-properties"><xades:SignedSignatureProperties><xades:SigningTime>{time}</xades:SigningTime><xades:SigningCertificateV2><xades:Cert><xades:CertDigest><ds:DigestMethod Algorithm="{sha256}"/><ds:DigestValue>{cert_digest}</ds:DigestValue></xades:CertDigest></xades:Cert></xades:SigningCertificateV2></xades:SignedSignatureProperties></xades:SignedProperties>{unsigned}</xades:QualifyingProperties></ds:Object></ds:Signature>"##,
            dsig = DSIG,
            c14n = options.canonicalization,
            method = options.algorithm.uri(),
            unsigned = unsigned,
            sha256 = SHA256,
            key_info = key_info,
            xades = XADES,
            time = options.signing_time,
            cert_digest = cert_digest,
        );

        let close = xml.rfind(ROOT_CLOSE).expect("DCC root closing tag");
        let draft = format!("{}{}{}", &xml[..close], signature, &xml[close..]);

        let tree = parse_xml(draft.as_bytes()).unwrap();
        let method = C14nMethod::from_uri(options.canonicalization).unwrap();

        let mut content = tree.clone();
        let signature_node = content.elements_named(DSIG, "Signature")[0];
        content.detach(signature_node);
        let document_digest = sha256(&canonicalize(&content, content.document(), &method));

        let properties = tree.elements_named(XADES, "SignedProperties")[0];
        let properties_digest = sha256(&canonicalize(&tree, properties, &method));

        let draft = draft
            .replace("@DOCUMENT@", &document_digest)
            .replace("@PROPERTIES@", &properties_digest);

        let tree = parse_xml(draft.as_bytes()).unwrap();
        let signed_info = tree.elements_named(DSIG, "SignedInfo")[0];
        let canonical = canonicalize(&tree, signed_info, &method);

        let mut signer = Signer::new(MessageDigest::sha256(), &pki.leaf.key).unwrap();
        if options.algorithm == SignatureAlgorithm::RsaPssSha256 {
            signer.set_rsa_padding(Padding::PKCS1_PSS).unwrap();
            signer.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH).unwrap();
        }
        signer.update(&canonical).unwrap();
        let der = signer.sign_to_vec().unwrap();

        let value = match options.algorithm {
            // XML-DSig carries ECDSA signatures as raw r || s
            SignatureAlgorithm::EcdsaSha256 => {
                let sig = EcdsaSig::from_der(&der).unwrap();
                let mut raw = sig.r().to_vec_padded(32).unwrap();
                raw.extend(sig.s().to_vec_padded(32).unwrap());
                raw
            }
            SignatureAlgorithm::RsaSha256 | SignatureAlgorithm::RsaPssSha256 => der,
        };

        draft.replace("@SIGNATURE@", &STANDARD.encode(value))
    }

    /// Signed DCC whose KeyInfo carries the leaf only.
    pub fn signed_dcc(pki: &TestPki) -> String {
        Self::sign(&Self::unsigned_dcc(), pki, &SignOptions::default())
    }
}

/// `xades:SignatureTimeStamp` with an opaque token; timestamps are classified
/// but never verified.
pub fn signature_timestamp() -> String {
    format!(
        "<xades:SignatureTimeStamp><ds:CanonicalizationMethod Algorithm=\"{}\"/><xades:EncapsulatedTimeStamp>MIIBAA==</xades:EncapsulatedTimeStamp></xades:SignatureTimeStamp>",
        EXC_C14N
    )
}

/// Long-term validation material: `CertificateValues` carrying `certs` and a
/// `RevocationValues` block with an opaque CRL.
pub fn long_term_values(certs: &[&X509]) -> String {
    let encapsulated: String = certs
        .iter()
        .map(|cert| {
            format!(
                "<xades:EncapsulatedX509Certificate>{}</xades:EncapsulatedX509Certificate>",
                STANDARD.encode(cert.to_der().unwrap())
            )
        })
        .collect();
    format!(
        "{}<xades:CertificateValues>{}</xades:CertificateValues><xades:RevocationValues><xades:CRLValues><xades:EncapsulatedCRLValue>MAA=</xades:EncapsulatedCRLValue></xades:CRLValues></xades:RevocationValues>",
        signature_timestamp(),
        encapsulated
    )
}

pub fn unix(year: i32, month: u32, day: u32) -> i64 {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap().timestamp()
}

fn sha256(data: &[u8]) -> String {
    STANDARD.encode(hash(MessageDigest::sha256(), data).unwrap())
}
